//! The translation step under measurement.

use std::error::Error;

/// Error returned by a translator. Recorded per item, never propagated.
pub type TranslationFailure = Box<dyn Error + Send + Sync>;

/// Turns one input into one output, e.g. a prompt into a specification or a
/// specification into code.
///
/// Implemented for every `Fn(&I) -> Result<O, TranslationFailure>` closure,
/// so most callers never name this trait.
pub trait Translator<I: ?Sized, O>: Sync {
    fn translate(&self, input: &I) -> Result<O, TranslationFailure>;
}

impl<I, O, F> Translator<I, O> for F
where
    I: ?Sized,
    F: Fn(&I) -> Result<O, TranslationFailure> + Sync,
{
    fn translate(&self, input: &I) -> Result<O, TranslationFailure> {
        self(input)
    }
}
