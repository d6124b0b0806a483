/// Command outcome determining exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Operation completed (exit 0).
    Success,
    /// Nothing cached yet, or some batch jobs refused (exit 1).
    Partial,
    /// Operation aborted or CLI error (exit 2).
    Refusal,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::Partial => 1,
            Outcome::Refusal => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Outcome;

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(Outcome::Success.exit_code(), 0);
        assert_eq!(Outcome::Partial.exit_code(), 1);
        assert_eq!(Outcome::Refusal.exit_code(), 2);
    }
}
