//! In-process backend implementing every repository trait.
//!
//! DESIGN
//! ======
//! All tables sit behind one `std::sync::Mutex`; no lock is held across an
//! await. Orderings match the Postgres queries so services behave the same
//! on either backend. Used when `DATABASE_URL` is unset and by every test.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    AccountStore, AppointmentStore, AssessmentStore, Credential, NewAccount, NotificationStore, ProfileStore,
    ProgressStore, SessionStore, SettingsStore, StoreError,
};
use crate::models::{
    Answer, Appointment, AppointmentStatus, Assessment, AssessmentPatch, AssessmentResponse, ClientDetails,
    DEFAULT_APPOINTMENT_MINUTES, NewAppointment, NewAssessment, NewNotification, Notification, PaymentStatus,
    ProfilePatch, ProgressMetrics, PsychiatristDetails, PsychiatristListing, Role, Session, SessionStatus, User,
};

#[derive(Default)]
struct Tables {
    credentials: HashMap<String, Credential>,
    auth_sessions: HashMap<String, (Uuid, OffsetDateTime)>,
    ws_tickets: HashMap<String, (Uuid, OffsetDateTime)>,
    users: HashMap<Uuid, User>,
    roles: Vec<(Uuid, Role)>,
    psychiatrists: HashMap<Uuid, PsychiatristDetails>,
    clients: HashMap<Uuid, ClientDetails>,
    appointments: Vec<Appointment>,
    assessments: Vec<Assessment>,
    responses: Vec<AssessmentResponse>,
    sessions: Vec<Session>,
    notifications: Vec<Notification>,
    progress: HashMap<Uuid, ProgressMetrics>,
    settings: HashMap<String, String>,
}

/// In-memory store. Cheap to construct; each instance is an isolated backend.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

impl Tables {
    /// Mirror of the `users` foreign keys on the Postgres tables.
    fn require_users(&self, ids: &[Uuid]) -> Result<(), StoreError> {
        match ids.iter().find(|id| !self.users.contains_key(id)) {
            Some(missing) => Err(StoreError::MissingReference(format!("no user {missing}"))),
            None => Ok(()),
        }
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

// =============================================================================
// ACCOUNTS
// =============================================================================

#[async_trait::async_trait]
impl AccountStore for MemoryStore {
    async fn create_account(&self, account: &NewAccount) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        if t.credentials.contains_key(&account.credential.email) {
            return Err(StoreError::Conflict(format!("email already registered: {}", account.credential.email)));
        }
        let user_id = account.user.id;
        t.credentials
            .insert(account.credential.email.clone(), account.credential.clone());
        t.users.insert(user_id, account.user.clone());
        t.roles.push((user_id, account.role));
        match account.role {
            Role::Psychiatrist => {
                t.psychiatrists
                    .insert(user_id, PsychiatristDetails::empty(user_id));
            }
            Role::Client => {
                t.clients
                    .insert(user_id, ClientDetails { profile_id: user_id, ..ClientDetails::default() });
            }
        }
        Ok(())
    }

    async fn credential_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.lock()?.credentials.get(email).cloned())
    }

    async fn insert_auth_session(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        self.lock()?
            .auth_sessions
            .insert(token.to_owned(), (user_id, expires_at));
        Ok(())
    }

    async fn auth_session_user(&self, token: &str, now: OffsetDateTime) -> Result<Option<Uuid>, StoreError> {
        Ok(self
            .lock()?
            .auth_sessions
            .get(token)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(user_id, _)| *user_id))
    }

    async fn delete_auth_session(&self, token: &str) -> Result<(), StoreError> {
        self.lock()?.auth_sessions.remove(token);
        Ok(())
    }

    async fn insert_ws_ticket(&self, ticket: &str, user_id: Uuid, expires_at: OffsetDateTime) -> Result<(), StoreError> {
        self.lock()?
            .ws_tickets
            .insert(ticket.to_owned(), (user_id, expires_at));
        Ok(())
    }

    async fn consume_ws_ticket(&self, ticket: &str, now: OffsetDateTime) -> Result<Option<Uuid>, StoreError> {
        Ok(self
            .lock()?
            .ws_tickets
            .remove(ticket)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(user_id, _)| user_id))
    }
}

// =============================================================================
// PROFILES
// =============================================================================

#[async_trait::async_trait]
impl ProfileStore for MemoryStore {
    async fn user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let t = self.lock()?;
        Ok(ids.iter().filter_map(|id| t.users.get(id).cloned()).collect())
    }

    async fn roles_for(&self, user_id: Uuid) -> Result<Vec<Role>, StoreError> {
        Ok(self
            .lock()?
            .roles
            .iter()
            .filter(|(id, _)| *id == user_id)
            .map(|(_, role)| *role)
            .collect())
    }

    async fn update_user(&self, id: Uuid, patch: &ProfilePatch) -> Result<Option<User>, StoreError> {
        let mut t = self.lock()?;
        let Some(user) = t.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = &patch.first_name {
            user.first_name.clone_from(v);
        }
        if let Some(v) = &patch.last_name {
            user.last_name.clone_from(v);
        }
        if patch.phone.is_some() {
            user.phone.clone_from(&patch.phone);
        }
        if patch.avatar_url.is_some() {
            user.avatar_url.clone_from(&patch.avatar_url);
        }
        if patch.bio.is_some() {
            user.bio.clone_from(&patch.bio);
        }
        Ok(Some(user.clone()))
    }

    async fn list_psychiatrists(&self) -> Result<Vec<PsychiatristListing>, StoreError> {
        let t = self.lock()?;
        let mut out: Vec<PsychiatristListing> = t
            .roles
            .iter()
            .filter(|(_, role)| *role == Role::Psychiatrist)
            .filter_map(|(id, _)| {
                let user = t.users.get(id)?.clone();
                let details = t
                    .psychiatrists
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| PsychiatristDetails::empty(*id));
                Some(PsychiatristListing { user, details })
            })
            .collect();
        out.sort_by(|a, b| {
            (a.user.last_name.as_str(), a.user.first_name.as_str())
                .cmp(&(b.user.last_name.as_str(), b.user.first_name.as_str()))
        });
        Ok(out)
    }

    async fn psychiatrist_details(&self, id: Uuid) -> Result<Option<PsychiatristDetails>, StoreError> {
        Ok(self.lock()?.psychiatrists.get(&id).cloned())
    }

    async fn upsert_psychiatrist_details(&self, details: &PsychiatristDetails) -> Result<(), StoreError> {
        self.lock()?
            .psychiatrists
            .insert(details.profile_id, details.clone());
        Ok(())
    }

    async fn client_details(&self, id: Uuid) -> Result<Option<ClientDetails>, StoreError> {
        Ok(self.lock()?.clients.get(&id).cloned())
    }

    async fn upsert_client_details(&self, details: &ClientDetails) -> Result<(), StoreError> {
        self.lock()?
            .clients
            .insert(details.profile_id, details.clone());
        Ok(())
    }
}

// =============================================================================
// APPOINTMENTS
// =============================================================================

fn update_appointment<F>(t: &mut Tables, id: Uuid, apply: F) -> Option<Appointment>
where
    F: FnOnce(&mut Appointment),
{
    let row = t.appointments.iter_mut().find(|a| a.id == id)?;
    apply(row);
    Some(row.clone())
}

#[async_trait::async_trait]
impl AppointmentStore for MemoryStore {
    async fn insert_appointment(&self, new: &NewAppointment) -> Result<Appointment, StoreError> {
        let mut t = self.lock()?;
        t.require_users(&[new.client_id, new.psychiatrist_id])?;
        let row = Appointment {
            id: Uuid::new_v4(),
            client_id: new.client_id,
            psychiatrist_id: new.psychiatrist_id,
            scheduled_for: new.scheduled_for,
            duration_minutes: new.duration_minutes.unwrap_or(DEFAULT_APPOINTMENT_MINUTES),
            session_type: new.session_type,
            status: new.status.unwrap_or(AppointmentStatus::Scheduled),
            notes: new.notes.clone(),
            payment_status: PaymentStatus::Unpaid,
            checkout_session_id: None,
            created_at: now(),
        };
        t.appointments.push(row.clone());
        Ok(row)
    }

    async fn appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self
            .lock()?
            .appointments
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn appointments_for_client(&self, client_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let mut rows: Vec<Appointment> = self
            .lock()?
            .appointments
            .iter()
            .filter(|a| a.client_id == client_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.scheduled_for);
        Ok(rows)
    }

    async fn appointments_for_psychiatrist(&self, psychiatrist_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let mut rows: Vec<Appointment> = self
            .lock()?
            .appointments
            .iter()
            .filter(|a| a.psychiatrist_id == psychiatrist_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.scheduled_for);
        Ok(rows)
    }

    async fn set_status(&self, id: Uuid, status: AppointmentStatus) -> Result<Option<Appointment>, StoreError> {
        Ok(update_appointment(&mut *self.lock()?, id, |a| a.status = status))
    }

    async fn set_scheduled_for(&self, id: Uuid, when: OffsetDateTime) -> Result<Option<Appointment>, StoreError> {
        Ok(update_appointment(&mut *self.lock()?, id, |a| a.scheduled_for = when))
    }

    async fn set_checkout_session(&self, id: Uuid, session_id: &str) -> Result<Option<Appointment>, StoreError> {
        Ok(update_appointment(&mut *self.lock()?, id, |a| {
            a.checkout_session_id = Some(session_id.to_owned());
        }))
    }

    async fn confirm_payment(&self, session_id: &str) -> Result<Option<Appointment>, StoreError> {
        let mut t = self.lock()?;
        let Some(row) = t
            .appointments
            .iter_mut()
            .find(|a| a.checkout_session_id.as_deref() == Some(session_id))
        else {
            return Ok(None);
        };
        row.status = AppointmentStatus::Confirmed;
        row.payment_status = PaymentStatus::Paid;
        Ok(Some(row.clone()))
    }
}

// =============================================================================
// ASSESSMENTS
// =============================================================================

#[async_trait::async_trait]
impl AssessmentStore for MemoryStore {
    async fn insert_assessment(&self, new: &NewAssessment) -> Result<Assessment, StoreError> {
        let mut t = self.lock()?;
        t.require_users(&[new.client_id, new.psychiatrist_id])?;
        let row = Assessment {
            id: Uuid::new_v4(),
            psychiatrist_id: new.psychiatrist_id,
            client_id: new.client_id,
            title: new.title.clone(),
            description: new.description.clone(),
            questions: new.questions.clone(),
            status: new.status,
            score: None,
            max_score: None,
            results: None,
            completed_at: None,
            created_at: now(),
        };
        t.assessments.push(row.clone());
        Ok(row)
    }

    async fn assessment(&self, id: Uuid) -> Result<Option<Assessment>, StoreError> {
        Ok(self.lock()?.assessments.iter().find(|a| a.id == id).cloned())
    }

    async fn assessments_for_client(&self, client_id: Uuid) -> Result<Vec<Assessment>, StoreError> {
        let mut rows: Vec<Assessment> = self
            .lock()?
            .assessments
            .iter()
            .filter(|a| a.client_id == client_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn assessments_for_psychiatrist(&self, psychiatrist_id: Uuid) -> Result<Vec<Assessment>, StoreError> {
        let mut rows: Vec<Assessment> = self
            .lock()?
            .assessments
            .iter()
            .filter(|a| a.psychiatrist_id == psychiatrist_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn update_assessment(&self, id: Uuid, patch: &AssessmentPatch) -> Result<Option<Assessment>, StoreError> {
        let mut t = self.lock()?;
        let Some(row) = t.assessments.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        if let Some(v) = &patch.title {
            row.title.clone_from(v);
        }
        if let Some(v) = &patch.description {
            row.description.clone_from(v);
        }
        if let Some(v) = &patch.questions {
            row.questions.clone_from(v);
        }
        if let Some(v) = patch.status {
            row.status = v;
        }
        if patch.score.is_some() {
            row.score = patch.score;
        }
        if patch.max_score.is_some() {
            row.max_score = patch.max_score;
        }
        if patch.results.is_some() {
            row.results.clone_from(&patch.results);
        }
        if patch.completed_at.is_some() {
            row.completed_at = patch.completed_at;
        }
        Ok(Some(row.clone()))
    }

    async fn delete_assessment(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut t = self.lock()?;
        let before = t.assessments.len();
        t.assessments.retain(|a| a.id != id);
        t.responses.retain(|r| r.assessment_id != id);
        Ok(t.assessments.len() != before)
    }

    async fn insert_response(
        &self,
        assessment_id: Uuid,
        client_id: Uuid,
        answers: &[Answer],
    ) -> Result<AssessmentResponse, StoreError> {
        let row = AssessmentResponse {
            id: Uuid::new_v4(),
            assessment_id,
            client_id,
            answers: answers.to_vec(),
            submitted_at: now(),
        };
        self.lock()?.responses.push(row.clone());
        Ok(row)
    }

    async fn responses_for(&self, assessment_id: Uuid) -> Result<Vec<AssessmentResponse>, StoreError> {
        let mut rows: Vec<AssessmentResponse> = self
            .lock()?
            .responses
            .iter()
            .filter(|r| r.assessment_id == assessment_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.submitted_at);
        Ok(rows)
    }
}

// =============================================================================
// LIVE SESSIONS
// =============================================================================

#[async_trait::async_trait]
impl SessionStore for MemoryStore {
    async fn insert_live_session(
        &self,
        appointment_id: Uuid,
        room_id: &str,
        started_at: OffsetDateTime,
    ) -> Result<Session, StoreError> {
        let mut t = self.lock()?;
        if t
            .sessions
            .iter()
            .any(|s| s.appointment_id == appointment_id && s.status == SessionStatus::Live)
        {
            return Err(StoreError::Conflict(format!("appointment {appointment_id} already has a live session")));
        }
        let row = Session {
            id: Uuid::new_v4(),
            appointment_id,
            status: SessionStatus::Live,
            room_id: Some(room_id.to_owned()),
            started_at: Some(started_at),
            ended_at: None,
        };
        t.sessions.push(row.clone());
        Ok(row)
    }

    async fn session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.lock()?.sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn live_session_for_appointment(&self, appointment_id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self
            .lock()?
            .sessions
            .iter()
            .find(|s| s.appointment_id == appointment_id && s.status == SessionStatus::Live)
            .cloned())
    }

    async fn end_session(&self, id: Uuid, ended_at: OffsetDateTime) -> Result<Option<Session>, StoreError> {
        let mut t = self.lock()?;
        let Some(row) = t.sessions.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        row.status = SessionStatus::Ended;
        row.ended_at = Some(ended_at);
        Ok(Some(row.clone()))
    }

    async fn live_sessions_for_psychiatrist(&self, psychiatrist_id: Uuid) -> Result<Vec<Session>, StoreError> {
        let t = self.lock()?;
        Ok(t.sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Live)
            .filter(|s| {
                t.appointments
                    .iter()
                    .any(|a| a.id == s.appointment_id && a.psychiatrist_id == psychiatrist_id)
            })
            .cloned()
            .collect())
    }
}

// =============================================================================
// NOTIFICATIONS / PROGRESS / SETTINGS
// =============================================================================

#[async_trait::async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(&self, new: &NewNotification) -> Result<Notification, StoreError> {
        let row = Notification {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            title: new.title.clone(),
            message: new.message.clone(),
            kind: new.kind.clone(),
            metadata: new.metadata.clone(),
            read: false,
            created_at: now(),
        };
        self.lock()?.notifications.push(row.clone());
        Ok(row)
    }

    async fn notifications_for(&self, user_id: Uuid) -> Result<Vec<Notification>, StoreError> {
        let mut rows: Vec<Notification> = self
            .lock()?
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Option<Notification>, StoreError> {
        let mut t = self.lock()?;
        let Some(row) = t
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
        else {
            return Ok(None);
        };
        row.read = true;
        Ok(Some(row.clone()))
    }
}

#[async_trait::async_trait]
impl ProgressStore for MemoryStore {
    async fn progress_for_client(&self, client_id: Uuid) -> Result<Option<ProgressMetrics>, StoreError> {
        Ok(self.lock()?.progress.get(&client_id).cloned())
    }

    async fn upsert_progress(&self, metrics: &ProgressMetrics) -> Result<(), StoreError> {
        self.lock()?
            .progress
            .insert(metrics.client_id, metrics.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl SettingsStore for MemoryStore {
    async fn setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.settings.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()?
            .settings
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
