/// Ordered API credentials handed out round-robin.
///
/// Owned by the admission queue's dispatch coordinator; never shared outside it.
#[derive(Debug, Clone, Default)]
pub struct CredentialPool {
    credentials: Vec<String>,
    cursor: usize,
}

impl CredentialPool {
    /// Blank entries are dropped.
    pub fn new(credentials: Vec<String>) -> Self {
        Self {
            credentials: credentials
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            cursor: 0,
        }
    }

    /// Returns the credential under the cursor and advances it, wrapping around.
    pub fn next_credential(&mut self) -> Option<String> {
        if self.credentials.is_empty() {
            return None;
        }
        let credential = self.credentials[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.credentials.len();
        Some(credential)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}
