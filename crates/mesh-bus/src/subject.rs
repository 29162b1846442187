//! # Subject Router
//!
//! Encodes and decodes the hierarchical addressing scheme mapping
//! (tenant, device, message-kind) to bus subjects. Used by every other
//! component; nothing else in the workspace builds subject strings by hand.

use mesh_types::{DeviceId, IdError, TenantId};
use thiserror::Error;

/// Errors from subject parsing and pattern construction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubjectError {
    /// The string did not match any known subject shape.
    #[error("unrecognized subject: {0}")]
    Unrecognized(String),

    /// A segment failed id validation.
    #[error(transparent)]
    Id(#[from] IdError),

    /// A pattern was malformed (empty, empty segment, or `>` not last).
    #[error("malformed pattern: {0}")]
    MalformedPattern(String),
}

/// A fully-resolved bus subject.
///
/// Every variant is tenant-scoped; [`Subject::tenant`] is what credential
/// checks run against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    /// `{tenant}.{device_id}.cmd` — request/reply: invoke a function.
    Command {
        tenant: TenantId,
        device_id: DeviceId,
    },
    /// `{tenant}.{device_id}.event.{event_name}` — device event.
    Event {
        tenant: TenantId,
        device_id: DeviceId,
        event_name: String,
    },
    /// `{tenant}.{device_id}.heartbeat` — liveness signal.
    Heartbeat {
        tenant: TenantId,
        device_id: DeviceId,
    },
    /// `{tenant}.registry` — registration RPCs.
    Registry { tenant: TenantId },
    /// `{tenant}.discovery` — discovery queries.
    Discovery { tenant: TenantId },
    /// `{tenant}.device.online` — registry lifecycle.
    DeviceOnline { tenant: TenantId },
    /// `{tenant}.device.offline` — registry lifecycle.
    DeviceOffline { tenant: TenantId },
    /// `{tenant}._inbox.{token}` — per-request reply subject.
    Inbox { tenant: TenantId, token: String },
}

impl Subject {
    /// The tenant this subject belongs to.
    #[must_use]
    pub fn tenant(&self) -> &TenantId {
        match self {
            Self::Command { tenant, .. }
            | Self::Event { tenant, .. }
            | Self::Heartbeat { tenant, .. }
            | Self::Registry { tenant }
            | Self::Discovery { tenant }
            | Self::DeviceOnline { tenant }
            | Self::DeviceOffline { tenant }
            | Self::Inbox { tenant, .. } => tenant,
        }
    }

    /// Encode to the canonical dot-separated form.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Command { tenant, device_id } => format!("{tenant}.{device_id}.cmd"),
            Self::Event {
                tenant,
                device_id,
                event_name,
            } => format!("{tenant}.{device_id}.event.{event_name}"),
            Self::Heartbeat { tenant, device_id } => format!("{tenant}.{device_id}.heartbeat"),
            Self::Registry { tenant } => format!("{tenant}.registry"),
            Self::Discovery { tenant } => format!("{tenant}.discovery"),
            Self::DeviceOnline { tenant } => format!("{tenant}.device.online"),
            Self::DeviceOffline { tenant } => format!("{tenant}.device.offline"),
            Self::Inbox { tenant, token } => format!("{tenant}._inbox.{token}"),
        }
    }

    /// Parse a subject string back into its structured form.
    ///
    /// The fixed shapes (`registry`, `discovery`, `device.online`,
    /// `device.offline`, `_inbox`) take precedence; device ids starting
    /// with `_` are rejected at construction so the namespaces cannot
    /// collide.
    pub fn parse(raw: &str) -> Result<Self, SubjectError> {
        let segments: Vec<&str> = raw.split('.').collect();
        let unrecognized = || SubjectError::Unrecognized(raw.to_string());

        match segments.as_slice() {
            [tenant, "registry"] => Ok(Self::Registry {
                tenant: TenantId::new(*tenant)?,
            }),
            [tenant, "discovery"] => Ok(Self::Discovery {
                tenant: TenantId::new(*tenant)?,
            }),
            [tenant, "device", "online"] => Ok(Self::DeviceOnline {
                tenant: TenantId::new(*tenant)?,
            }),
            [tenant, "device", "offline"] => Ok(Self::DeviceOffline {
                tenant: TenantId::new(*tenant)?,
            }),
            [tenant, "_inbox", token] if !token.is_empty() => Ok(Self::Inbox {
                tenant: TenantId::new(*tenant)?,
                token: (*token).to_string(),
            }),
            [tenant, device, "cmd"] => Ok(Self::Command {
                tenant: TenantId::new(*tenant)?,
                device_id: DeviceId::new(*device)?,
            }),
            [tenant, device, "heartbeat"] => Ok(Self::Heartbeat {
                tenant: TenantId::new(*tenant)?,
                device_id: DeviceId::new(*device)?,
            }),
            [tenant, device, "event", event_name] if !event_name.is_empty() => Ok(Self::Event {
                tenant: TenantId::new(*tenant)?,
                device_id: DeviceId::new(*device)?,
                event_name: (*event_name).to_string(),
            }),
            _ => Err(unrecognized()),
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// One token of a subscription pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternToken {
    /// Matches exactly this segment.
    Literal(String),
    /// `*` — matches exactly one segment.
    SingleWildcard,
    /// `>` — matches one or more trailing segments.
    TailWildcard,
}

/// A subscription pattern over encoded subjects.
///
/// `*` matches exactly one segment; a trailing `>` matches one or more.
/// The tenant position may be a literal or (for service-scoped credentials
/// only) a wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectPattern {
    tokens: Vec<PatternToken>,
    raw: String,
}

impl SubjectPattern {
    /// Parse a pattern string.
    pub fn parse(raw: &str) -> Result<Self, SubjectError> {
        if raw.is_empty() {
            return Err(SubjectError::MalformedPattern("empty pattern".to_string()));
        }
        let segments: Vec<&str> = raw.split('.').collect();
        let mut tokens = Vec::with_capacity(segments.len());

        for (i, segment) in segments.iter().enumerate() {
            let token = match *segment {
                "" => {
                    return Err(SubjectError::MalformedPattern(format!(
                        "empty segment in {raw:?}"
                    )))
                }
                "*" => PatternToken::SingleWildcard,
                ">" => {
                    if i + 1 != segments.len() {
                        return Err(SubjectError::MalformedPattern(format!(
                            "'>' must be the last segment in {raw:?}"
                        )));
                    }
                    PatternToken::TailWildcard
                }
                literal => PatternToken::Literal(literal.to_string()),
            };
            tokens.push(token);
        }

        Ok(Self {
            tokens,
            raw: raw.to_string(),
        })
    }

    /// Pattern matching an exact subject.
    #[must_use]
    pub fn exact(subject: &Subject) -> Self {
        let raw = subject.encode();
        Self {
            tokens: raw
                .split('.')
                .map(|s| PatternToken::Literal(s.to_string()))
                .collect(),
            raw,
        }
    }

    /// The original pattern string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The tenant this pattern is pinned to, if its first token is a
    /// literal. Patterns with a wildcard tenant require service scope.
    #[must_use]
    pub fn tenant_literal(&self) -> Option<&str> {
        match self.tokens.first() {
            Some(PatternToken::Literal(t)) => Some(t),
            _ => None,
        }
    }

    /// Whether this pattern matches an encoded subject.
    #[must_use]
    pub fn matches(&self, subject: &str) -> bool {
        let segments: Vec<&str> = subject.split('.').collect();
        let mut si = 0;

        for (ti, token) in self.tokens.iter().enumerate() {
            match token {
                PatternToken::Literal(literal) => {
                    if segments.get(si) != Some(&literal.as_str()) {
                        return false;
                    }
                    si += 1;
                }
                PatternToken::SingleWildcard => {
                    if si >= segments.len() {
                        return false;
                    }
                    si += 1;
                }
                PatternToken::TailWildcard => {
                    // At least one remaining segment; `ti` is already known
                    // to be the last token.
                    debug_assert_eq!(ti + 1, self.tokens.len());
                    return si < segments.len();
                }
            }
        }

        si == segments.len()
    }
}

impl std::fmt::Display for SubjectPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
