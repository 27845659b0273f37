//! Backend registry: which storage kinds this process can actually use
//!
//! The host probes its environment once at startup (which extensions are
//! loaded, at which versions), builds a [`RuntimeCapabilities`] value, and
//! passes it down. The core never inspects the environment itself, which
//! keeps selection pure and testable.
//!
//! The kind list is ordered by ascending preference: the *last* element is
//! the best available default for `auto` resolution. That ranking carries no
//! deeper law than the configuration that produced it, so it lives in
//! [`ProbePolicy`] rather than in code.

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;

/// A host extension reported to the probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostExtension {
    /// Extension name as the host reports it
    pub name: String,

    /// Extension version, when the host knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl HostExtension {
    /// Describe an extension with a known version.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }

    /// Describe an extension whose version the host cannot report.
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }
}

/// Policy inputs for the capability probe.
#[derive(Debug, Clone)]
pub struct ProbePolicy {
    /// Always-available kinds in ascending preference order (last = best).
    pub base_order: Vec<BackendKind>,

    /// Host extension that enables the shared-memory kind.
    pub shared_memory_extension: String,

    /// Minimum extension version for the shared-memory kind; `None` accepts
    /// any version. An extension with no reported version fails a set
    /// minimum.
    pub shared_memory_min_version: Option<String>,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            base_order: vec![
                BackendKind::CompiledFile,
                BackendKind::Memory,
                BackendKind::File,
            ],
            shared_memory_extension: "shm".to_string(),
            shared_memory_min_version: None,
        }
    }
}

impl ProbePolicy {
    /// Require a minimum shared-memory extension version.
    pub fn with_shared_memory_min_version(mut self, version: impl Into<String>) -> Self {
        self.shared_memory_min_version = Some(version.into());
        self
    }

    fn admits_shared_memory(&self, ext: &HostExtension) -> bool {
        match (&self.shared_memory_min_version, &ext.version) {
            (None, _) => true,
            (Some(min), Some(version)) => version_at_least(version, min),
            (Some(_), None) => false,
        }
    }
}

/// The set of backend kinds usable in this process, ordered by ascending
/// preference. Computed once per process and passed down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeCapabilities {
    kinds: Vec<BackendKind>,
}

impl RuntimeCapabilities {
    /// Probe the reported extensions against a policy.
    ///
    /// The zero-dependency kinds (`memory`, `file`, `compiled-file`) are
    /// guaranteed present regardless of policy; the shared-memory kind is
    /// appended when its gating extension passes the version predicate.
    pub fn probe(extensions: &[HostExtension], policy: &ProbePolicy) -> Self {
        let mut kinds = policy.base_order.clone();
        kinds.dedup();

        for fallback in [
            BackendKind::Memory,
            BackendKind::File,
            BackendKind::CompiledFile,
        ] {
            if !kinds.contains(&fallback) {
                kinds.insert(0, fallback);
            }
        }

        let gated = extensions
            .iter()
            .any(|ext| ext.name == policy.shared_memory_extension && policy.admits_shared_memory(ext));
        if gated && !kinds.contains(&BackendKind::SharedMemory) {
            kinds.push(BackendKind::SharedMemory);
        }

        Self { kinds }
    }

    /// Build directly from an ordered kind list. An empty list degrades to
    /// `[memory]` so [`Self::best`] stays total.
    pub fn from_kinds(kinds: Vec<BackendKind>) -> Self {
        if kinds.is_empty() {
            Self {
                kinds: vec![BackendKind::Memory],
            }
        } else {
            Self { kinds }
        }
    }

    /// Ordered available kinds, ascending preference.
    pub fn available_kinds(&self) -> &[BackendKind] {
        &self.kinds
    }

    /// Whether a kind is usable in this process.
    pub fn is_supported(&self, kind: BackendKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// The highest-priority available kind (last element).
    pub fn best(&self) -> BackendKind {
        *self.kinds.last().expect("capability list is never empty")
    }
}

impl Default for RuntimeCapabilities {
    fn default() -> Self {
        Self::probe(&[], &ProbePolicy::default())
    }
}

/// Dotted-numeric version comparison: `version >= min`.
///
/// Non-numeric components compare as 0, missing components as 0, so
/// `"4.0" >= "4.0.0"` holds.
fn version_at_least(version: &str, min: &str) -> bool {
    let parse = |s: &str| -> Vec<u64> {
        s.split('.')
            .map(|part| part.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };
    let a = parse(version);
    let b = parse(min);
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        if x != y {
            return x > y;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_probe_yields_fallback_kinds() {
        let caps = RuntimeCapabilities::default();
        assert_eq!(
            caps.available_kinds(),
            &[
                BackendKind::CompiledFile,
                BackendKind::Memory,
                BackendKind::File,
            ]
        );
        assert_eq!(caps.best(), BackendKind::File);
        assert!(!caps.is_supported(BackendKind::SharedMemory));
    }

    #[test]
    fn shared_memory_appended_when_extension_present() {
        let caps = RuntimeCapabilities::probe(
            &[HostExtension::new("shm", "4.0.2")],
            &ProbePolicy::default(),
        );
        assert!(caps.is_supported(BackendKind::SharedMemory));
        assert_eq!(caps.best(), BackendKind::SharedMemory);
    }

    #[test]
    fn shared_memory_version_gate() {
        let policy = ProbePolicy::default().with_shared_memory_min_version("4.0.2");

        let old = RuntimeCapabilities::probe(&[HostExtension::new("shm", "4.0.1")], &policy);
        assert!(!old.is_supported(BackendKind::SharedMemory));

        let exact = RuntimeCapabilities::probe(&[HostExtension::new("shm", "4.0.2")], &policy);
        assert!(exact.is_supported(BackendKind::SharedMemory));

        let newer = RuntimeCapabilities::probe(&[HostExtension::new("shm", "4.1")], &policy);
        assert!(newer.is_supported(BackendKind::SharedMemory));

        let unversioned =
            RuntimeCapabilities::probe(&[HostExtension::unversioned("shm")], &policy);
        assert!(!unversioned.is_supported(BackendKind::SharedMemory));
    }

    #[test]
    fn unrelated_extensions_are_ignored() {
        let caps = RuntimeCapabilities::probe(
            &[HostExtension::new("imagick", "7.1")],
            &ProbePolicy::default(),
        );
        assert!(!caps.is_supported(BackendKind::SharedMemory));
    }

    #[test]
    fn fallback_kinds_always_present() {
        let policy = ProbePolicy {
            base_order: vec![BackendKind::File],
            ..ProbePolicy::default()
        };
        let caps = RuntimeCapabilities::probe(&[], &policy);
        for kind in [
            BackendKind::Memory,
            BackendKind::File,
            BackendKind::CompiledFile,
        ] {
            assert!(caps.is_supported(kind), "{kind} must be guaranteed");
        }
        // The policy's own ordering is preserved at the tail.
        assert_eq!(caps.best(), BackendKind::File);
    }

    #[test]
    fn from_kinds_empty_degrades_to_memory() {
        let caps = RuntimeCapabilities::from_kinds(vec![]);
        assert_eq!(caps.best(), BackendKind::Memory);
    }

    #[test]
    fn version_comparison() {
        assert!(version_at_least("4.0.2", "4.0.2"));
        assert!(version_at_least("4.0.10", "4.0.2"));
        assert!(version_at_least("5", "4.9.9"));
        assert!(!version_at_least("4.0.1", "4.0.2"));
        assert!(version_at_least("4.0", "4.0.0"));
    }
}
