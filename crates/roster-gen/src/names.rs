//! Display-name synthesis from a first/last name pool.

use rand::seq::SliceRandom;
use rand::Rng;
use roster_core::NamePool;

/// Last names shorter than this may be appended to a one-letter surname.
const SNIPPET_MAX_CHARS: usize = 3;

/// Combine a random first and last name into `"First Last"`.
///
/// A one-character surname is, with probability 0.5, extended with another
/// short surname from the pool so that names like "Kai W" become "Kai Wu".
pub fn synthesize_name<R: Rng + ?Sized>(pool: &NamePool, rng: &mut R) -> String {
    let first = choose(pool.first_names(), rng);
    let last = choose(pool.last_names(), rng);
    if last.chars().count() > 1 {
        return format!("{first} {last}");
    }

    let mut last = last.to_string();
    if rng.gen_bool(0.5) {
        let snippets: Vec<&String> = pool
            .last_names()
            .iter()
            .filter(|s| s.chars().count() < SNIPPET_MAX_CHARS)
            .collect();
        if let Some(snippet) = snippets.choose(rng) {
            last.push_str(snippet);
        }
    }
    format!("{first} {last}")
}

fn choose<'a, R: Rng + ?Sized>(names: &'a [String], rng: &mut R) -> &'a str {
    // NamePool guarantees both lists are non-empty.
    names.choose(rng).map_or("", String::as_str)
}
