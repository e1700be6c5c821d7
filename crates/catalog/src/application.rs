use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crm_core::{ApplicationId, DirectionId, DomainError, DomainResult, EventId, ProjectId, UserId};

use crate::event::{Direction, Event};

/// An applicant's submission to a direction.
///
/// `event`/`direction` become `None` when the referenced record is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub user: UserId,
    pub event: Option<EventId>,
    pub direction: Option<DirectionId>,
    pub project: Option<ProjectId>,
    pub message: String,
    pub is_link: bool,
    pub is_approved: bool,
    pub comment: String,
    pub date_sub: DateTime<Utc>,
    pub date_end: DateTime<Utc>,
    pub status: Option<i64>,
    pub team_id: Option<i64>,
}

/// Applicant-supplied fields.
///
/// `project_ref` is an alias accepted for older clients; when both are sent
/// they must agree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApplicationDraft {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_link: bool,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub project: Option<ProjectId>,
    #[serde(default)]
    pub project_ref: Option<ProjectId>,
}

impl ApplicationDraft {
    pub fn project(&self) -> DomainResult<Option<ProjectId>> {
        match (self.project, self.project_ref) {
            (Some(a), Some(b)) if a != b => Err(DomainError::validation(
                "project and project_ref must match",
            )),
            (a, b) => Ok(a.or(b)),
        }
    }
}

/// A validated submission, waiting for an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub user: UserId,
    pub event: EventId,
    pub direction: DirectionId,
    pub project: Option<ProjectId>,
    pub message: String,
    pub is_link: bool,
    pub comment: String,
    pub date_sub: DateTime<Utc>,
    pub date_end: DateTime<Utc>,
}

impl NewApplication {
    pub fn into_application(self, id: ApplicationId) -> Application {
        Application {
            id,
            user: self.user,
            event: Some(self.event),
            direction: Some(self.direction),
            project: self.project,
            message: self.message,
            is_link: self.is_link,
            is_approved: false,
            comment: self.comment,
            date_sub: self.date_sub,
            date_end: self.date_end,
            status: None,
            team_id: None,
        }
    }
}

/// Submission rules: the direction belongs to the event, the deadline has not
/// passed, and the user has not applied to this direction already.
pub fn submit_application(
    draft: ApplicationDraft,
    user: UserId,
    event: &Event,
    direction: &Direction,
    already_applied: bool,
    now: DateTime<Utc>,
) -> DomainResult<NewApplication> {
    if direction.event != event.id {
        return Err(DomainError::NotFound);
    }
    if !event.accepts_applications_at(now) {
        return Err(DomainError::invariant("application deadline has passed"));
    }
    if already_applied {
        return Err(DomainError::conflict(
            "an application to this direction already exists",
        ));
    }
    let project = draft.project()?;

    Ok(NewApplication {
        user,
        event: event.id,
        direction: direction.id,
        project,
        message: draft.message,
        is_link: draft.is_link,
        comment: draft.comment,
        date_sub: now,
        date_end: event.end_app_date,
    })
}

/// Moderator edits; absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApplicationReview {
    pub is_approved: Option<bool>,
    pub comment: Option<String>,
    pub status: Option<i64>,
    pub team_id: Option<i64>,
    pub project: Option<ProjectId>,
}

impl Application {
    pub fn apply_review(&mut self, review: ApplicationReview) {
        if let Some(v) = review.is_approved {
            self.is_approved = v;
        }
        if let Some(v) = review.comment {
            self.comment = v;
        }
        if review.status.is_some() {
            self.status = review.status;
        }
        if review.team_id.is_some() {
            self.team_id = review.team_id;
        }
        if review.project.is_some() {
            self.project = review.project;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;

    fn event(deadline: DateTime<Utc>) -> Event {
        Event {
            id: EventId::new(1),
            name: "Hackathon".into(),
            description: String::new(),
            stage: "open".into(),
            start_date: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            end_app_date: deadline,
            specialization: None,
        }
    }

    fn direction(event: i64) -> Direction {
        Direction {
            id: DirectionId::new(5),
            event: EventId::new(event),
            name: "Backend".into(),
            description: String::new(),
            leader: None,
        }
    }

    #[test]
    fn submission_before_deadline_is_accepted() {
        let now = Utc::now();
        let ev = event(now + Duration::days(1));
        let new = submit_application(
            ApplicationDraft {
                message: "hi".into(),
                project_ref: Some(ProjectId::new(3)),
                ..Default::default()
            },
            UserId::new(9),
            &ev,
            &direction(1),
            false,
            now,
        )
        .unwrap();
        assert_eq!(new.project, Some(ProjectId::new(3)));
        assert_eq!(new.date_end, ev.end_app_date);

        let app = new.into_application(ApplicationId::new(1));
        assert!(!app.is_approved);
        assert_eq!(app.direction, Some(DirectionId::new(5)));
    }

    #[test]
    fn late_submission_is_rejected() {
        let now = Utc::now();
        let res = submit_application(
            ApplicationDraft::default(),
            UserId::new(9),
            &event(now - Duration::minutes(1)),
            &direction(1),
            false,
            now,
        );
        assert!(matches!(res, Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn second_submission_is_a_conflict() {
        let now = Utc::now();
        let res = submit_application(
            ApplicationDraft::default(),
            UserId::new(9),
            &event(now + Duration::days(1)),
            &direction(1),
            true,
            now,
        );
        assert!(matches!(res, Err(DomainError::Conflict(_))));
    }

    #[test]
    fn direction_of_another_event_is_not_found() {
        let now = Utc::now();
        let res = submit_application(
            ApplicationDraft::default(),
            UserId::new(9),
            &event(now + Duration::days(1)),
            &direction(2),
            false,
            now,
        );
        assert_eq!(res, Err(DomainError::NotFound));
    }

    #[test]
    fn project_aliases_must_agree() {
        let draft = ApplicationDraft {
            project: Some(ProjectId::new(1)),
            project_ref: Some(ProjectId::new(2)),
            ..Default::default()
        };
        assert!(draft.project().is_err());
    }

    #[test]
    fn review_touches_only_sent_fields() {
        let now = Utc::now();
        let mut app = submit_application(
            ApplicationDraft {
                comment: "first".into(),
                ..Default::default()
            },
            UserId::new(9),
            &event(now + Duration::days(1)),
            &direction(1),
            false,
            now,
        )
        .unwrap()
        .into_application(ApplicationId::new(4));

        app.apply_review(ApplicationReview {
            is_approved: Some(true),
            ..Default::default()
        });
        assert!(app.is_approved);
        assert_eq!(app.comment, "first");
    }
}
