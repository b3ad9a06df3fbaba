use coffer_domain::CalendarZone;

/// Default object prefix holding one CSV log per principal.
pub const DEFAULT_AUDIT_ROOT: &str = "audit";

/// Configuration for the audit log engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogConfig {
    /// Object prefix holding `<principal>.csv` logs.
    pub root: String,
    /// Zone used to map event instants onto calendar dates for date filters.
    pub calendar: CalendarZone,
}

impl AuditLogConfig {
    /// Creates a configuration rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<String>, calendar: CalendarZone) -> Self {
        Self {
            root: root.into(),
            calendar,
        }
    }
}

impl Default for AuditLogConfig {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_ROOT, CalendarZone::Local)
    }
}
