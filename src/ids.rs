//! Deterministic handler ID allocation.
//!
//! `<event>_<firstCommand|action>_<hash>` where the hash is a DJB2 rolling
//! hash of the original source text, absolute-valued and rendered as four
//! base-36 digits. The allocator keeps the used-id set for the lifetime of
//! the compiler instance; only an explicit reset clears it.

use std::collections::HashSet;

use crate::expression::sanitize_identifier;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const HASH_SPACE: u64 = 36 * 36 * 36 * 36;

fn djb2(source: &str) -> i32 {
    let mut hash: i32 = 5381;
    for byte in source.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(byte as i32);
    }
    hash
}

fn base36_hash(source: &str) -> String {
    let mut value = (djb2(source) as i64).unsigned_abs() % HASH_SPACE;
    let mut digits = [b'0'; 4];
    for slot in digits.iter_mut().rev() {
        *slot = BASE36_DIGITS[(value % 36) as usize];
        value /= 36;
    }
    String::from_utf8_lossy(&digits).into_owned()
}

#[derive(Debug, Default)]
pub struct HandlerIdAllocator {
    used: HashSet<String>,
}

impl HandlerIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a session-unique id. Collisions get an increasing numeric
    /// suffix until the id is unused.
    pub fn allocate(&mut self, event: &str, first_command: Option<&str>, source: &str) -> String {
        let event = sanitize_identifier(event);
        let command = first_command
            .map(sanitize_identifier)
            .unwrap_or_else(|| "action".to_string());
        let base = format!("{}_{}_{}", event, command, base36_hash(source));

        let mut candidate = base.clone();
        let mut suffix = 2u32;
        while self.used.contains(&candidate) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        self.used.insert(candidate.clone());
        candidate
    }

    pub fn reset(&mut self) {
        self.used.clear();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
