/// How stored passwords are produced and checked. Callers never compare
/// passwords themselves, so a hashing scheme can replace the plaintext one.
pub trait Credentials: Send + Sync {
    /// The value written to the member's `password` column.
    fn seal(&self, password: &str) -> String;

    fn matches(&self, stored: &str, candidate: &str) -> bool;
}

/// Stored passwords are the passwords themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct Plaintext;

impl Credentials for Plaintext {
    fn seal(&self, password: &str) -> String {
        password.to_owned()
    }

    fn matches(&self, stored: &str, candidate: &str) -> bool {
        stored == candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_is_exact_equality() {
        let stored = Plaintext.seal("0520");
        assert!(Plaintext.matches(&stored, "0520"));
        assert!(!Plaintext.matches(&stored, "0520 "));
        assert!(!Plaintext.matches(&stored, ""));
    }
}
