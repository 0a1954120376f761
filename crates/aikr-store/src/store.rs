use std::path::Path;

use rusqlite::{Connection, params};

use aikr_core::{
    Budget, ConceptState, Memory, Punctuation, SentenceRecord, Snapshot, Stamp, Term, TruthValue,
};

use crate::error::{Result, StoreError};
use crate::schema;

const TICK_KEY: &str = "tick";

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        let result = stmt.query_row([key], |row| row.get(0)).ok();
        Ok(result)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        set_metadata_on(&self.conn, key, value)
    }

    pub fn concept_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM concepts", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // --- Save ---

    /// Replace the stored memory image with `snapshot`, atomically.
    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch("DELETE FROM sentences; DELETE FROM concepts;")?;
        set_metadata_on(&tx, TICK_KEY, &snapshot.tick.to_string())?;

        {
            let mut concept_stmt = tx.prepare(
                "INSERT INTO concepts (term, position, priority, activation, idle_ticks)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            let mut sentence_stmt = tx.prepare(
                "INSERT INTO sentences (concept, bag, position, term, punctuation, frequency,
                 confidence, priority, durability, quality, bag_priority, stamp_id, evidence,
                 created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            )?;

            for (position, (term, state)) in snapshot.concepts.iter().enumerate() {
                let concept = encode_term(term)?;
                concept_stmt.execute(params![
                    concept,
                    position as i64,
                    state.priority,
                    state.activation,
                    state.idle_ticks,
                ])?;
                for (bag, records) in [("task", &state.tasks), ("belief", &state.beliefs)] {
                    for (position, record) in records.iter().enumerate() {
                        let evidence = serde_json::to_string(&record.stamp.evidence)
                            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
                        sentence_stmt.execute(params![
                            concept,
                            bag,
                            position as i64,
                            encode_term(&record.term)?,
                            record.punctuation.as_str(),
                            record.truth.map(|t| t.frequency),
                            record.truth.map(|t| t.confidence),
                            record.budget.priority,
                            record.budget.durability,
                            record.budget.quality,
                            record.priority,
                            record.stamp.id as i64,
                            evidence,
                            record.stamp.created_at as i64,
                        ])?;
                    }
                }
            }
        }

        tx.commit()?;
        tracing::info!(
            "saved {} concepts, {} sentences",
            snapshot.concepts.len(),
            snapshot.sentence_count()
        );
        Ok(())
    }

    pub fn save_memory(&self, memory: &Memory) -> Result<()> {
        self.save_snapshot(&memory.snapshot())
    }

    // --- Load ---

    pub fn load_snapshot(&self) -> Result<Snapshot> {
        let tick = match self.get_metadata(TICK_KEY)? {
            Some(value) => value
                .parse::<u64>()
                .map_err(|e| StoreError::InvalidData(format!("bad tick '{value}': {e}")))?,
            None => 0,
        };

        let mut stmt = self.conn.prepare(
            "SELECT term, priority, activation, idle_ticks FROM concepts ORDER BY position",
        )?;
        let rows: Vec<(String, f64, f64, u32)> = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<std::result::Result<_, _>>()?;

        let mut concepts = Vec::with_capacity(rows.len());
        for (term, priority, activation, idle_ticks) in rows {
            let state = ConceptState {
                priority,
                activation,
                idle_ticks,
                tasks: self.load_records(&term, "task")?,
                beliefs: self.load_records(&term, "belief")?,
            };
            concepts.push((decode_term(&term)?, state));
        }
        let snapshot = Snapshot { tick, concepts };
        tracing::info!(
            "loaded {} concepts, {} sentences at tick {tick}",
            snapshot.concepts.len(),
            snapshot.sentence_count()
        );
        Ok(snapshot)
    }

    fn load_records(&self, concept: &str, bag: &str) -> Result<Vec<SentenceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT term, punctuation, frequency, confidence, priority, durability, quality,
                    bag_priority, stamp_id, evidence, created_at
             FROM sentences WHERE concept = ?1 AND bag = ?2 ORDER BY position",
        )?;
        type Row = (
            String,
            String,
            Option<f64>,
            Option<f64>,
            f64,
            f64,
            f64,
            f64,
            i64,
            String,
            i64,
        );
        let rows: Vec<Row> = stmt
            .query_map(params![concept, bag], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    row.get(10)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter()
            .map(
                |(term, punct, f, c, p, d, q, bag_priority, stamp_id, evidence, created_at)| {
                    let punctuation = parse_punctuation(&punct)?;
                    let truth = match (f, c) {
                        (Some(f), Some(c)) => Some(TruthValue::new(f, c)),
                        _ => None,
                    };
                    let evidence: Vec<u64> = serde_json::from_str(&evidence).map_err(|e| {
                        StoreError::InvalidData(format!("bad evidence '{evidence}': {e}"))
                    })?;
                    Ok(SentenceRecord {
                        term: decode_term(&term)?,
                        punctuation,
                        truth,
                        budget: Budget::clamped(p, d, q),
                        stamp: Stamp {
                            id: stamp_id as u64,
                            evidence,
                            created_at: created_at as u64,
                        },
                        priority: bag_priority,
                    })
                },
            )
            .collect()
    }

    /// Replace `memory`'s contents with what is stored here.
    pub fn load_into(&self, memory: &mut Memory) -> Result<()> {
        let snapshot = self.load_snapshot()?;
        memory.restore(&snapshot);
        Ok(())
    }
}

fn set_metadata_on(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

fn encode_term(term: &Term) -> Result<String> {
    serde_json::to_string(term).map_err(|e| StoreError::InvalidData(format!("term: {e}")))
}

fn decode_term(text: &str) -> Result<Term> {
    serde_json::from_str(text).map_err(|e| StoreError::InvalidData(format!("bad term '{text}': {e}")))
}

fn parse_punctuation(s: &str) -> Result<Punctuation> {
    match s {
        "belief" => Ok(Punctuation::Belief),
        "goal" => Ok(Punctuation::Goal),
        "question" => Ok(Punctuation::Question),
        "quest" => Ok(Punctuation::Quest),
        other => Err(StoreError::InvalidData(format!(
            "unknown punctuation '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use aikr_core::{AtomStore, MemoryConfig, ReflexiveCycle, RuleRegistry};

    fn make_memory() -> Memory {
        let mut memory =
            Memory::new(MemoryConfig::default(), Arc::new(AtomStore::new())).unwrap();
        for (s, p) in [("cat", "mammal"), ("mammal", "animal"), ("dog", "mammal")] {
            memory
                .submit_term(
                    &Term::inheritance(s, p),
                    Punctuation::Belief,
                    Some(TruthValue::new(1.0, 0.9)),
                    None,
                )
                .unwrap();
        }
        memory
            .submit_term(&Term::inheritance("cat", "animal"), Punctuation::Question, None, None)
            .unwrap();
        let registry = RuleRegistry::with_syllogisms(memory.store());
        ReflexiveCycle::new(&registry).run(&mut memory, 10);
        memory
    }

    #[test]
    fn test_save_load_roundtrip() {
        let memory = make_memory();
        let store = Store::open_in_memory().unwrap();
        let snapshot = memory.snapshot();
        store.save_snapshot(&snapshot).unwrap();

        let loaded = store.load_snapshot().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(store.concept_count().unwrap(), memory.concept_count());
    }

    #[test]
    fn test_save_replaces_previous() {
        let store = Store::open_in_memory().unwrap();
        store.save_memory(&make_memory()).unwrap();
        store.save_snapshot(&Snapshot::default()).unwrap();
        assert_eq!(store.concept_count().unwrap(), 0);
        assert_eq!(store.load_snapshot().unwrap(), Snapshot::default());
    }

    #[test]
    fn test_load_into_fresh_memory() {
        let memory = make_memory();
        let store = Store::open_in_memory().unwrap();
        store.save_memory(&memory).unwrap();

        let mut fresh = Memory::new(MemoryConfig::default(), Arc::new(AtomStore::new())).unwrap();
        store.load_into(&mut fresh).unwrap();
        assert_eq!(fresh.concept_count(), memory.concept_count());
        assert_eq!(fresh.tick(), memory.tick());
        assert_eq!(fresh.beliefs().len(), memory.beliefs().len());
    }

    #[test]
    fn test_metadata() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.get_metadata("agent").unwrap(), None);
        store.set_metadata("agent", "aikr").unwrap();
        assert_eq!(store.get_metadata("agent").unwrap().as_deref(), Some("aikr"));
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.db");
        {
            let store = Store::open(&path).unwrap();
            store.save_memory(&make_memory()).unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert!(store.concept_count().unwrap() > 0);
    }
}
