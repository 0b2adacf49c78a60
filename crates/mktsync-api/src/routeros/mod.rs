//! MikroTik RouterOS API (the binary protocol on port 8728).
//!
//! A request is a *sentence*: a command word such as `/queue/simple/print`
//! followed by attribute words (`=name=value`) and query words
//! (`?name=value`). The device answers with zero or more `!re` sentences and
//! a closing `!done`; errors arrive as `!trap` before the `!done`.

pub mod client;
pub mod codec;

use std::collections::BTreeMap;

pub use client::{Response, RouterOsClient};
pub use codec::{Sentence, SentenceCodec};

/// Attribute map of a single reply sentence (`=key=value` words).
pub type Record = BTreeMap<String, String>;

/// A classified reply sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `!re`: one data row.
    Row(Record),
    /// `!done`: end of the reply. May carry `=ret=` (id of an added item).
    Done(Record),
    /// `!trap`: the command failed. Reading continues until `!done`.
    Trap(Record),
    /// `!fatal`: the device is closing the session.
    Fatal(String),
    /// `!empty` (RouterOS 7.18+) or an unrecognized reply word.
    Ignored,
}

impl Reply {
    pub fn from_sentence(sentence: &Sentence) -> Self {
        let mut words = sentence.words().iter();
        let Some(kind) = words.next() else {
            return Self::Ignored;
        };

        match kind.as_str() {
            "!re" => Self::Row(attributes(words)),
            "!done" => Self::Done(attributes(words)),
            "!trap" => Self::Trap(attributes(words)),
            "!fatal" => Self::Fatal(words.cloned().collect::<Vec<_>>().join(" ")),
            _ => Self::Ignored,
        }
    }
}

/// Collect `=key=value` words; `.tag=` and other API words are skipped.
fn attributes<'a>(words: impl Iterator<Item = &'a String>) -> Record {
    words
        .filter_map(|w| w.strip_prefix('='))
        .filter_map(|w| w.split_once('='))
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(words: &[&str]) -> Sentence {
        Sentence::new(words.iter().map(|w| (*w).to_owned()).collect())
    }

    #[test]
    fn row_attributes_keep_equals_in_value() {
        let reply = Reply::from_sentence(&sentence(&[
            "!re",
            "=.id=*1A",
            "=target=10.0.0.5/32",
            "=comment=a=b",
        ]));

        let Reply::Row(record) = reply else {
            panic!("expected row, got {reply:?}");
        };
        assert_eq!(record.get(".id").map(String::as_str), Some("*1A"));
        assert_eq!(record.get("target").map(String::as_str), Some("10.0.0.5/32"));
        assert_eq!(record.get("comment").map(String::as_str), Some("a=b"));
    }

    #[test]
    fn trap_and_fatal_are_classified() {
        let trap = Reply::from_sentence(&sentence(&["!trap", "=message=no such item"]));
        assert!(matches!(trap, Reply::Trap(ref r) if r["message"] == "no such item"));

        let fatal = Reply::from_sentence(&sentence(&["!fatal", "session terminated"]));
        assert_eq!(fatal, Reply::Fatal("session terminated".into()));

        assert_eq!(Reply::from_sentence(&sentence(&["!empty"])), Reply::Ignored);
    }

    #[test]
    fn tag_words_are_not_attributes() {
        let reply = Reply::from_sentence(&sentence(&["!done", ".tag=7", "=ret=*2"]));
        let Reply::Done(record) = reply else {
            panic!("expected done");
        };
        assert_eq!(record.len(), 1);
        assert_eq!(record["ret"], "*2");
    }
}
