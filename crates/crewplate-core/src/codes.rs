use rand::Rng;
use tracing::debug;

use crewplate_db::Database;
use crewplate_types::models::{ACCESS_CODE_LEN, AccessCode, Crew};

use crate::convert;
use crate::error::{CoreError, Result};

/// How many candidate codes are drawn before giving up.
pub const MAX_CODE_ATTEMPTS: usize = 8;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Where candidate codes come from.
pub trait CodeSource: Send + Sync {
    fn next_code(&self) -> String;
}

/// Uniform draws over uppercase letters and digits.
pub struct RandomCodes;

impl CodeSource for RandomCodes {
    fn next_code(&self) -> String {
        let mut rng = rand::rng();
        (0..ACCESS_CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    }
}

pub struct AccessCodeDirectory<'a> {
    db: &'a Database,
    source: &'a dyn CodeSource,
}

impl<'a> AccessCodeDirectory<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self::with_source(db, &RandomCodes)
    }

    pub fn with_source(db: &'a Database, source: &'a dyn CodeSource) -> Self {
        Self { db, source }
    }

    /// Draw one candidate, normalized. Does not check availability.
    fn candidate(&self) -> Result<AccessCode> {
        Ok(AccessCode::parse(&self.source.next_code())?)
    }

    /// A code no active crew currently holds.
    ///
    /// Availability is checked, not reserved: the crew insert still has to
    /// win the unique constraint.
    pub fn generate_code(&self) -> Result<AccessCode> {
        self.generate_code_within(&mut 0)
    }

    /// [`generate_code`](Self::generate_code) drawing from a shared budget.
    /// `used` counts draws across calls, so a caller that loses an insert
    /// race and asks again spends the same [`MAX_CODE_ATTEMPTS`].
    pub fn generate_code_within(&self, used: &mut usize) -> Result<AccessCode> {
        while *used < MAX_CODE_ATTEMPTS {
            *used += 1;
            let code = self.candidate()?;
            if !self.db.access_code_exists(code.as_str())? {
                return Ok(code);
            }
            debug!("Access code {} taken (attempt {}/{})", code, used, MAX_CODE_ATTEMPTS);
        }
        Err(CoreError::CodeGenerationExhausted(MAX_CODE_ATTEMPTS))
    }

    /// Case-insensitive lookup: the input is normalized, then matched exactly.
    pub fn resolve_code(&self, raw: &str) -> Result<Crew> {
        let code = AccessCode::parse(raw)?;
        let row = self
            .db
            .get_crew_by_code(code.as_str())?
            .ok_or(CoreError::NotFound("crew"))?;
        convert::crew(row)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::membership::MembershipGraph;
    use crate::testutil::{temp_db, user};

    /// Hands out a fixed script of codes, then repeats the last one.
    pub(crate) struct ScriptedCodes(Mutex<VecDeque<String>>);

    impl ScriptedCodes {
        pub(crate) fn new(codes: &[&str]) -> Self {
            Self(Mutex::new(codes.iter().map(|c| c.to_string()).collect()))
        }
    }

    impl CodeSource for ScriptedCodes {
        fn next_code(&self) -> String {
            let mut codes = self.0.lock().unwrap();
            if codes.len() > 1 {
                codes.pop_front().unwrap()
            } else {
                codes.front().cloned().unwrap()
            }
        }
    }

    #[test]
    fn random_codes_are_six_uppercase_alphanumerics() {
        for _ in 0..100 {
            let code = RandomCodes.next_code();
            assert_eq!(code.len(), ACCESS_CODE_LEN);
            assert!(
                code.bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
            );
        }
    }

    #[test]
    fn generate_skips_codes_in_use() {
        let db = temp_db();
        let u1 = user(&db, "u1");
        let taken = ScriptedCodes::new(&["TAKEN1"]);
        MembershipGraph::with_code_source(&db, &taken)
            .create_crew("First", None, u1)
            .unwrap();

        let source = ScriptedCodes::new(&["TAKEN1", "taken1", "FRESH1"]);
        let code = AccessCodeDirectory::with_source(&db, &source)
            .generate_code()
            .unwrap();
        assert_eq!(code.as_str(), "FRESH1");
    }

    #[test]
    fn generate_gives_up_after_bounded_attempts() {
        let db = temp_db();
        let u1 = user(&db, "u1");
        let source = ScriptedCodes::new(&["SAME00"]);
        MembershipGraph::with_code_source(&db, &source)
            .create_crew("First", None, u1)
            .unwrap();

        let err = AccessCodeDirectory::with_source(&db, &source)
            .generate_code()
            .unwrap_err();
        assert!(matches!(err, CoreError::CodeGenerationExhausted(MAX_CODE_ATTEMPTS)));
    }

    #[test]
    fn shared_budget_counts_every_draw() {
        let db = temp_db();
        let u1 = user(&db, "u1");
        let taken = ScriptedCodes::new(&["TAKEN1"]);
        MembershipGraph::with_code_source(&db, &taken)
            .create_crew("First", None, u1)
            .unwrap();

        let source = ScriptedCodes::new(&["TAKEN1", "FRESH1"]);
        let codes = AccessCodeDirectory::with_source(&db, &source);
        let mut used = MAX_CODE_ATTEMPTS - 1;
        assert!(matches!(
            codes.generate_code_within(&mut used),
            Err(CoreError::CodeGenerationExhausted(MAX_CODE_ATTEMPTS))
        ));
        assert_eq!(used, MAX_CODE_ATTEMPTS);

        let mut used = 0;
        assert_eq!(codes.generate_code_within(&mut used).unwrap().as_str(), "FRESH1");
        assert_eq!(used, 1);
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let db = temp_db();
        let u1 = user(&db, "u1");
        let source = ScriptedCodes::new(&["K3F9QZ"]);
        let crew = MembershipGraph::with_code_source(&db, &source)
            .create_crew("Dinner Club", None, u1)
            .unwrap();

        let codes = AccessCodeDirectory::new(&db);
        assert_eq!(codes.resolve_code("k3f9qz").unwrap().id, crew.id);
        assert_eq!(codes.resolve_code(" K3F9QZ ").unwrap().id, crew.id);
        assert!(matches!(codes.resolve_code("ZZZZZZ"), Err(CoreError::NotFound("crew"))));
        assert!(matches!(codes.resolve_code("K3F"), Err(CoreError::Validation(_))));
    }
}
