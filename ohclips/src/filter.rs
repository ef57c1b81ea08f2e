//! Profanity filtering for user-submitted text.

use regex::Regex;

/// Replaces disallowed terms. Never rejects input and is deterministic.
pub trait ContentFilter: Send + Sync {
    fn clean(&self, text: &str) -> String;
}

const DEFAULT_TERMS: &[&str] = &[
    "arse", "arsehole", "ass", "asshole", "bastard", "bitch", "bollocks", "bullshit", "crap", "cunt", "damn",
    "dick", "dickhead", "douche", "dumbass", "fuck", "fucked", "fucker", "fucking", "idiot", "jackass", "moron",
    "motherfucker", "piss", "prick", "pussy", "retard", "shit", "shitty", "slut", "twat", "wanker", "whore",
];

/// Word-list filter that masks each matched word with `*`, one per character.
pub struct WordListFilter {
    pattern: Option<Regex>,
    placeholder: char,
}

impl WordListFilter {
    pub fn new<I, S>(terms: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut terms: Vec<String> = terms
            .into_iter()
            .map(|term| term.as_ref().trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .collect();
        terms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        terms.dedup();

        let pattern = if terms.is_empty() {
            None
        } else {
            let alternation = terms.iter().map(|term| regex::escape(term)).collect::<Vec<_>>().join("|");
            Some(Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))?)
        };
        Ok(Self {
            pattern,
            placeholder: '*',
        })
    }

    /// The built-in list extended with `extra` terms.
    pub fn with_extra_terms(extra: &[String]) -> Result<Self, regex::Error> {
        Self::new(DEFAULT_TERMS.iter().map(|term| term.to_string()).chain(extra.iter().cloned()))
    }
}

impl Default for WordListFilter {
    fn default() -> Self {
        Self::with_extra_terms(&[]).unwrap_or(Self {
            pattern: None,
            placeholder: '*',
        })
    }
}

impl ContentFilter for WordListFilter {
    fn clean(&self, text: &str) -> String {
        match &self.pattern {
            Some(pattern) => pattern
                .replace_all(text, |caps: &regex::Captures<'_>| {
                    std::iter::repeat_n(self.placeholder, caps[0].chars().count()).collect::<String>()
                })
                .into_owned(),
            None => text.to_string(),
        }
    }
}
