//! Secret registration and masking.

use std::collections::BTreeSet;
use std::io::{self, Write};

/// Marker written in place of every secret occurrence.
pub const MASK: &str = "********";

/// The set of secret values registered during one pipeline run.
///
/// Secrets are only ever added. Masking replaces longer secrets first, so a
/// secret that is a substring of another cannot leave part of the longer one
/// behind.
///
/// # Example
///
/// ```
/// use conveyor::secrets::SecretVault;
///
/// let mut vault = SecretVault::new();
/// vault.add_secret("s3cr3t");
///
/// assert_eq!(vault.mask("value=s3cr3t"), "value=********");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SecretVault {
    secrets: BTreeSet<String>,
}

impl SecretVault {
    /// Create an empty vault.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret value.
    ///
    /// Empty strings are ignored, as are values made only of `*` characters,
    /// which would match the mask itself.
    pub fn add_secret(&mut self, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() || value.chars().all(|c| c == '*') {
            return;
        }
        self.secrets.insert(value);
    }

    /// Register multiple secret values.
    pub fn add_secrets(&mut self, values: impl IntoIterator<Item = impl Into<String>>) {
        for value in values {
            self.add_secret(value);
        }
    }

    /// Check if a value has been registered.
    pub fn contains(&self, value: &str) -> bool {
        self.secrets.contains(value)
    }

    /// Number of registered secrets.
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Check if the vault is empty.
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Replace every exact occurrence of a registered secret with [`MASK`].
    pub fn mask(&self, input: &str) -> String {
        if self.secrets.is_empty() || input.is_empty() {
            return input.to_string();
        }

        let mut ordered: Vec<&String> = self.secrets.iter().collect();
        ordered.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut result = input.to_string();
        for secret in ordered {
            if result.contains(secret.as_str()) {
                result = result.replace(secret.as_str(), MASK);
            }
        }
        result
    }

    /// Create a writer that masks complete lines before passing them on.
    ///
    /// # Example
    ///
    /// ```
    /// use conveyor::secrets::SecretVault;
    /// use std::io::Write;
    ///
    /// let mut vault = SecretVault::new();
    /// vault.add_secret("hunter2");
    ///
    /// let mut output = Vec::new();
    /// {
    ///     let mut writer = vault.writer(&mut output);
    ///     writeln!(writer, "password is hunter2").unwrap();
    ///     writer.flush().unwrap();
    /// }
    ///
    /// assert_eq!(String::from_utf8(output).unwrap(), "password is ********\n");
    /// ```
    pub fn writer<W: Write>(&self, inner: W) -> MaskingWriter<'_, W> {
        MaskingWriter {
            inner,
            vault: self,
            buffer: String::new(),
        }
    }
}

/// A writer that masks secret values.
///
/// Input is buffered until a newline so a secret split across two writes is
/// still caught.
pub struct MaskingWriter<'a, W: Write> {
    inner: W,
    vault: &'a SecretVault,
    buffer: String,
}

impl<W: Write> Write for MaskingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.push_str(&String::from_utf8_lossy(buf));

        while let Some(newline_pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline_pos).collect();
            self.inner.write_all(self.vault.mask(&line).as_bytes())?;
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            let masked = self.vault.mask(&self.buffer);
            self.inner.write_all(masked.as_bytes())?;
            self.buffer.clear();
        }
        self.inner.flush()
    }
}
