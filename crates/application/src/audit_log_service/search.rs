use chrono::NaiveDate;

use coffer_domain::{AuditEvent, AuditEventType, CalendarZone};

/// Optional predicates combined with AND semantics; `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditSearchCriteria {
    /// Case-insensitive substring of the original filename.
    pub subject_name_contains: Option<String>,
    /// Exact log owner.
    pub principal_equals: Option<String>,
    /// Exact event type.
    pub event_type_equals: Option<AuditEventType>,
    /// Inclusive lower bound on the event's calendar date.
    pub date_on_or_after: Option<NaiveDate>,
    /// Inclusive upper bound on the event's calendar date.
    pub date_on_or_before: Option<NaiveDate>,
}

impl AuditSearchCriteria {
    /// Returns criteria with blank text filters removed and the filename
    /// needle lowercased. The principal is kept verbatim for exact matching.
    #[must_use]
    pub(crate) fn normalized(&self) -> Self {
        Self {
            subject_name_contains: self
                .subject_name_contains
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_lowercase),
            principal_equals: self
                .principal_equals
                .clone()
                .filter(|value| !value.trim().is_empty()),
            event_type_equals: self.event_type_equals.clone(),
            date_on_or_after: self.date_on_or_after,
            date_on_or_before: self.date_on_or_before,
        }
    }

    /// Returns whether the date bounds exclude every possible date.
    #[must_use]
    pub(crate) fn has_empty_date_range(&self) -> bool {
        matches!(
            (self.date_on_or_after, self.date_on_or_before),
            (Some(after), Some(before)) if before < after
        )
    }

    /// Evaluates every predicate against one event.
    ///
    /// Expects criteria produced by [`Self::normalized`].
    #[must_use]
    pub(crate) fn matches(&self, event: &AuditEvent, calendar: CalendarZone) -> bool {
        self.matches_subject_name(event)
            && self.matches_principal(event)
            && self.matches_event_type(event)
            && self.matches_date_range(event, calendar)
    }

    fn matches_subject_name(&self, event: &AuditEvent) -> bool {
        self.subject_name_contains
            .as_deref()
            .is_none_or(|needle| event.subject_name.to_lowercase().contains(needle))
    }

    fn matches_principal(&self, event: &AuditEvent) -> bool {
        self.principal_equals
            .as_deref()
            .is_none_or(|principal| event.principal == principal)
    }

    fn matches_event_type(&self, event: &AuditEvent) -> bool {
        self.event_type_equals
            .as_ref()
            .is_none_or(|event_type| &event.event_type == event_type)
    }

    fn matches_date_range(&self, event: &AuditEvent, calendar: CalendarZone) -> bool {
        if self.date_on_or_after.is_none() && self.date_on_or_before.is_none() {
            return true;
        }

        let event_date = calendar.date_of(&event.timestamp);
        let after_start = self
            .date_on_or_after
            .is_none_or(|start| event_date >= start);
        let before_end = self.date_on_or_before.is_none_or(|end| event_date <= end);

        after_start && before_end
    }
}

/// Orders events newest first; ties keep their input order.
pub(crate) fn sort_newest_first(events: &mut [AuditEvent]) {
    events.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
}
