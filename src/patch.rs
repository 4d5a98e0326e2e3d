//! Applies a batch of edit commands to the target text.
//!
//! Ranges are computed against the pristine text, checked for overlap,
//! and only then applied back-to-front so pending offsets stay valid.
//! Commands queued at the same offset land in declaration order.

use std::rc::Rc;

use tracing::debug;

use crate::commands::{EditCommand, EditRange};

/// Two ranges collide; nothing was applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("{first} and {second} edits overlap.")]
    Overlap {
        first: &'static str,
        second: &'static str,
    },
}

/// A pending batch of edits against one text buffer.
pub struct Refactor<'a> {
    text: String,
    queued: Vec<Rc<dyn EditCommand + 'a>>,
}

impl<'a> Refactor<'a> {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            queued: Vec::new(),
        }
    }

    pub fn queue(&mut self, command: Rc<dyn EditCommand + 'a>) {
        self.queued.push(command);
    }

    pub fn extend(&mut self, commands: impl IntoIterator<Item = Rc<dyn EditCommand + 'a>>) {
        self.queued.extend(commands);
    }

    /// Apply every queued edit and return the new text.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Overlap`] when two edits touch the same
    /// range; the original text is left unmodified.
    pub fn process(self) -> Result<String, PatchError> {
        let mut pending: Vec<(Rc<dyn EditCommand + 'a>, EditRange)> = self
            .queued
            .iter()
            .filter_map(|command| {
                command
                    .find_range(&self.text)
                    .map(|range| (Rc::clone(command), range))
            })
            .collect();

        // Reversing before the stable descending sort makes commands at
        // equal offsets execute in reverse declaration order, which puts
        // their insertions in declaration order in the final text.
        pending.reverse();
        pending.sort_by(|a, b| b.1.offset.cmp(&a.1.offset));

        for pair in pending.windows(2) {
            if intersects(pair[0].1, pair[1].1) {
                return Err(PatchError::Overlap {
                    first: pair[0].0.kind(),
                    second: pair[1].0.kind(),
                });
            }
        }

        let all: Vec<&dyn EditCommand> = pending
            .iter()
            .map(|(command, _)| command.as_ref())
            .collect();
        for (index, (command, _)) in pending.iter().enumerate() {
            command.pre_execute(&all, index);
        }

        debug!(edits = pending.len(), "applying");
        let mut text = self.text;
        for (command, range) in &pending {
            command.execute(&mut text, *range);
        }
        Ok(text)
    }
}

/// `a` sits at the same or a higher offset than `b`. A zero-length range
/// conflicts only when it falls strictly inside the other.
fn intersects(a: EditRange, b: EditRange) -> bool {
    if a.length == 0 {
        a.offset > b.offset && a.offset < b.offset + b.length
    } else if b.length == 0 {
        b.offset > a.offset && b.offset < a.offset + a.length
    } else {
        a.offset < b.offset + b.length && b.offset < a.offset + a.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Indent, InsertBeforeLine};

    #[test]
    fn edits_apply_back_to_front() {
        let mut refactor = Refactor::new("one\ntwo\n");
        refactor.queue(Rc::new(InsertBeforeLine::new(0, vec!["zero".to_string()])));
        refactor.queue(Rc::new(InsertBeforeLine::new(
            4,
            vec!["middle".to_string()],
        )));
        assert_eq!(refactor.process().unwrap(), "zero\none\nmiddle\ntwo\n");
    }

    #[test]
    fn same_offset_edits_keep_declaration_order() {
        let mut refactor = Refactor::new("end\n");
        refactor.queue(Rc::new(InsertBeforeLine::new(0, vec!["a".to_string()])));
        refactor.queue(Rc::new(InsertBeforeLine::new(0, vec!["b".to_string()])));
        assert_eq!(refactor.process().unwrap(), "a\nb\nend\n");
    }

    #[test]
    fn overlapping_edits_are_rejected() {
        let mut refactor = Refactor::new("abc\ndef\n");
        refactor.queue(Rc::new(Indent::new(0, 6, "\t")));
        refactor.queue(Rc::new(Indent::new(4, 3, "\t")));
        assert_eq!(
            refactor.process().unwrap_err().to_string(),
            "Indent and Indent edits overlap."
        );
    }

    #[test]
    fn no_op_commands_are_dropped() {
        let mut refactor = Refactor::new("abc\n");
        refactor.queue(Rc::new(Indent::new(0, 3, "")));
        assert_eq!(refactor.process().unwrap(), "abc\n");
    }

    #[test]
    fn zero_length_edits_may_touch_a_boundary() {
        let mut refactor = Refactor::new("abc\ndef\n");
        refactor.queue(Rc::new(Indent::new(0, 3, "\t")));
        refactor.queue(Rc::new(InsertBeforeLine::new(4, vec!["x".to_string()])));
        assert_eq!(refactor.process().unwrap(), "\tabc\nx\ndef\n");
    }
}
