//! Postgres backend for every repository trait.
//!
//! DESIGN
//! ======
//! Plain `sqlx::query` with positional binds and `Row::get`; no compile-time
//! checked macros so the crate builds without a live database. Enumerated
//! columns are stored as text and parsed on read. A value that does not
//! parse is reported as `StoreError::Corrupt` instead of being guessed at.
//!
//! ERROR HANDLING
//! ==============
//! Unique violations (`23505`) surface as `StoreError::Conflict` and
//! foreign-key violations (`23503`) as `StoreError::MissingReference`; every
//! other driver failure passes through as `StoreError::Database`.

use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    AccountStore, AppointmentStore, AssessmentStore, Credential, NewAccount, NotificationStore, ProfileStore,
    ProgressStore, SessionStore, SettingsStore, StoreError,
};
use crate::models::{
    Answer, Appointment, AppointmentStatus, Assessment, AssessmentPatch, AssessmentResponse, AssessmentStatus,
    ClientDetails, DEFAULT_APPOINTMENT_MINUTES, NewAppointment, NewAssessment, NewNotification, Notification,
    PaymentStatus, ProfilePatch, ProgressMetrics, PsychiatristDetails, PsychiatristListing, Question, Role, Session,
    SessionStatus, SessionType, Trend, User,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_write_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("23505") => return StoreError::Conflict(db.message().to_owned()),
            Some("23503") => return StoreError::MissingReference(db.message().to_owned()),
            _ => {}
        }
    }
    StoreError::Database(err)
}

fn parse_col<T>(table: &'static str, raw: &str, parse: fn(&str) -> Option<T>) -> Result<T, StoreError> {
    parse(raw).ok_or_else(|| StoreError::Corrupt { table, detail: format!("unexpected value {raw:?}") })
}

fn json_col<T: serde::de::DeserializeOwned>(table: &'static str, value: serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Corrupt { table, detail: e.to_string() })
}

// =============================================================================
// ROW MAPPING
// =============================================================================

const USER_COLUMNS: &str = "id, email, first_name, last_name, phone, avatar_url, bio, created_at";

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone: row.get("phone"),
        avatar_url: row.get("avatar_url"),
        bio: row.get("bio"),
        created_at: row.get("created_at"),
    }
}

fn psychiatrist_details_from_row(row: &PgRow) -> PsychiatristDetails {
    PsychiatristDetails {
        profile_id: row.get("profile_id"),
        specialization: row.get("specialization"),
        experience_years: row.get("experience_years"),
        hourly_rate_cents: row.get("hourly_rate_cents"),
        verified: row.get("verified"),
        availability: row.get("availability"),
    }
}

const APPOINTMENT_COLUMNS: &str = "id, client_id, psychiatrist_id, scheduled_for, duration_minutes, session_type, \
                                   status, notes, payment_status, checkout_session_id, created_at";

fn appointment_from_row(row: &PgRow) -> Result<Appointment, StoreError> {
    const T: &str = "appointments";
    Ok(Appointment {
        id: row.get("id"),
        client_id: row.get("client_id"),
        psychiatrist_id: row.get("psychiatrist_id"),
        scheduled_for: row.get("scheduled_for"),
        duration_minutes: row.get("duration_minutes"),
        session_type: parse_col(T, row.get::<&str, _>("session_type"), SessionType::parse)?,
        status: parse_col(T, row.get::<&str, _>("status"), AppointmentStatus::parse)?,
        notes: row.get("notes"),
        payment_status: parse_col(T, row.get::<&str, _>("payment_status"), PaymentStatus::parse)?,
        checkout_session_id: row.get("checkout_session_id"),
        created_at: row.get("created_at"),
    })
}

const ASSESSMENT_COLUMNS: &str = "id, psychiatrist_id, client_id, title, description, questions, status, score, \
                                  max_score, results, completed_at, created_at";

fn assessment_from_row(row: &PgRow) -> Result<Assessment, StoreError> {
    const T: &str = "assessments";
    Ok(Assessment {
        id: row.get("id"),
        psychiatrist_id: row.get("psychiatrist_id"),
        client_id: row.get("client_id"),
        title: row.get("title"),
        description: row.get("description"),
        questions: json_col::<Vec<Question>>(T, row.get("questions"))?,
        status: parse_col(T, row.get::<&str, _>("status"), AssessmentStatus::parse)?,
        score: row.get("score"),
        max_score: row.get("max_score"),
        results: row.get("results"),
        completed_at: row.get("completed_at"),
        created_at: row.get("created_at"),
    })
}

fn response_from_row(row: &PgRow) -> Result<AssessmentResponse, StoreError> {
    Ok(AssessmentResponse {
        id: row.get("id"),
        assessment_id: row.get("assessment_id"),
        client_id: row.get("client_id"),
        answers: json_col::<Vec<Answer>>("assessment_responses", row.get("answers"))?,
        submitted_at: row.get("submitted_at"),
    })
}

const SESSION_COLUMNS: &str = "id, appointment_id, status, room_id, started_at, ended_at";

fn session_from_row(row: &PgRow) -> Result<Session, StoreError> {
    Ok(Session {
        id: row.get("id"),
        appointment_id: row.get("appointment_id"),
        status: parse_col("sessions", row.get::<&str, _>("status"), SessionStatus::parse)?,
        room_id: row.get("room_id"),
        started_at: row.get("started_at"),
        ended_at: row.get("ended_at"),
    })
}

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, message, kind, metadata, read, created_at";

fn notification_from_row(row: &PgRow) -> Notification {
    Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        message: row.get("message"),
        kind: row.get("kind"),
        metadata: row.get("metadata"),
        read: row.get("read"),
        created_at: row.get("created_at"),
    }
}

// =============================================================================
// ACCOUNTS
// =============================================================================

#[async_trait::async_trait]
impl AccountStore for PgStore {
    async fn create_account(&self, account: &NewAccount) -> Result<(), StoreError> {
        let user = &account.user;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"INSERT INTO profiles (id, email, first_name, last_name, phone, avatar_url, bio, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(&user.avatar_url)
        .bind(&user.bio)
        .bind(user.created_at)
        .execute(tx.as_mut())
        .await
        .map_err(map_write_err)?;

        sqlx::query("INSERT INTO credentials (user_id, email, password_hash) VALUES ($1, $2, $3)")
            .bind(account.credential.user_id)
            .bind(&account.credential.email)
            .bind(&account.credential.password_hash)
            .execute(tx.as_mut())
            .await
            .map_err(map_write_err)?;

        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
            .bind(user.id)
            .bind(account.role.as_str())
            .execute(tx.as_mut())
            .await?;

        let detail_sql = match account.role {
            Role::Psychiatrist => "INSERT INTO psychiatrists (profile_id) VALUES ($1)",
            Role::Client => "INSERT INTO clients (profile_id) VALUES ($1)",
        };
        sqlx::query(detail_sql)
            .bind(user.id)
            .execute(tx.as_mut())
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn credential_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError> {
        let row = sqlx::query("SELECT user_id, email, password_hash FROM credentials WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Credential {
            user_id: r.get("user_id"),
            email: r.get("email"),
            password_hash: r.get("password_hash"),
        }))
    }

    async fn insert_auth_session(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO auth_sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn auth_session_user(&self, token: &str, now: OffsetDateTime) -> Result<Option<Uuid>, StoreError> {
        let row = sqlx::query("SELECT user_id FROM auth_sessions WHERE token = $1 AND expires_at > $2")
            .bind(token)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("user_id")))
    }

    async fn delete_auth_session(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM auth_sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_ws_ticket(&self, ticket: &str, user_id: Uuid, expires_at: OffsetDateTime) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO ws_tickets (ticket, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(ticket)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn consume_ws_ticket(&self, ticket: &str, now: OffsetDateTime) -> Result<Option<Uuid>, StoreError> {
        let row = sqlx::query("DELETE FROM ws_tickets WHERE ticket = $1 AND expires_at > $2 RETURNING user_id")
            .bind(ticket)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("user_id")))
    }
}

// =============================================================================
// PROFILES
// =============================================================================

#[async_trait::async_trait]
impl ProfileStore for PgStore {
    async fn user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM profiles WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM profiles WHERE id = ANY($1)"))
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn roles_for(&self, user_id: Uuid) -> Result<Vec<Role>, StoreError> {
        let rows = sqlx::query("SELECT role FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| parse_col("user_roles", r.get::<&str, _>("role"), Role::parse))
            .collect()
    }

    async fn update_user(&self, id: Uuid, patch: &ProfilePatch) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            r"UPDATE profiles SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                phone = COALESCE($4, phone),
                avatar_url = COALESCE($5, avatar_url),
                bio = COALESCE($6, bio)
              WHERE id = $1
              RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&patch.first_name)
        .bind(&patch.last_name)
        .bind(&patch.phone)
        .bind(&patch.avatar_url)
        .bind(&patch.bio)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn list_psychiatrists(&self) -> Result<Vec<PsychiatristListing>, StoreError> {
        let rows = sqlx::query(
            r"SELECT p.id, p.email, p.first_name, p.last_name, p.phone, p.avatar_url, p.bio, p.created_at,
                     p.id AS profile_id,
                     COALESCE(d.specialization, '') AS specialization,
                     COALESCE(d.experience_years, 0) AS experience_years,
                     COALESCE(d.hourly_rate_cents, 0) AS hourly_rate_cents,
                     COALESCE(d.verified, FALSE) AS verified,
                     COALESCE(d.availability, 'null'::jsonb) AS availability
              FROM profiles p
              JOIN user_roles r ON r.user_id = p.id AND r.role = 'psychiatrist'
              LEFT JOIN psychiatrists d ON d.profile_id = p.id
              ORDER BY p.last_name, p.first_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| PsychiatristListing { user: user_from_row(r), details: psychiatrist_details_from_row(r) })
            .collect())
    }

    async fn psychiatrist_details(&self, id: Uuid) -> Result<Option<PsychiatristDetails>, StoreError> {
        let row = sqlx::query(
            r"SELECT profile_id, specialization, experience_years, hourly_rate_cents, verified, availability
              FROM psychiatrists WHERE profile_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(psychiatrist_details_from_row))
    }

    async fn upsert_psychiatrist_details(&self, details: &PsychiatristDetails) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO psychiatrists (profile_id, specialization, experience_years, hourly_rate_cents, verified, availability)
              VALUES ($1, $2, $3, $4, $5, $6)
              ON CONFLICT (profile_id) DO UPDATE SET
                specialization = EXCLUDED.specialization,
                experience_years = EXCLUDED.experience_years,
                hourly_rate_cents = EXCLUDED.hourly_rate_cents,
                verified = EXCLUDED.verified,
                availability = EXCLUDED.availability",
        )
        .bind(details.profile_id)
        .bind(&details.specialization)
        .bind(details.experience_years)
        .bind(details.hourly_rate_cents)
        .bind(details.verified)
        .bind(&details.availability)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn client_details(&self, id: Uuid) -> Result<Option<ClientDetails>, StoreError> {
        let row = sqlx::query(
            r"SELECT profile_id, date_of_birth, gender, emergency_contact, insurance_provider, insurance_member_id
              FROM clients WHERE profile_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| ClientDetails {
            profile_id: r.get("profile_id"),
            date_of_birth: r.get("date_of_birth"),
            gender: r.get("gender"),
            emergency_contact: r.get("emergency_contact"),
            insurance_provider: r.get("insurance_provider"),
            insurance_member_id: r.get("insurance_member_id"),
        }))
    }

    async fn upsert_client_details(&self, details: &ClientDetails) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO clients (profile_id, date_of_birth, gender, emergency_contact, insurance_provider, insurance_member_id)
              VALUES ($1, $2, $3, $4, $5, $6)
              ON CONFLICT (profile_id) DO UPDATE SET
                date_of_birth = EXCLUDED.date_of_birth,
                gender = EXCLUDED.gender,
                emergency_contact = EXCLUDED.emergency_contact,
                insurance_provider = EXCLUDED.insurance_provider,
                insurance_member_id = EXCLUDED.insurance_member_id",
        )
        .bind(details.profile_id)
        .bind(details.date_of_birth)
        .bind(&details.gender)
        .bind(&details.emergency_contact)
        .bind(&details.insurance_provider)
        .bind(&details.insurance_member_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// =============================================================================
// APPOINTMENTS
// =============================================================================

#[async_trait::async_trait]
impl AppointmentStore for PgStore {
    async fn insert_appointment(&self, new: &NewAppointment) -> Result<Appointment, StoreError> {
        let row = sqlx::query(&format!(
            r"INSERT INTO appointments (id, client_id, psychiatrist_id, scheduled_for, duration_minutes, session_type, status, notes)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
              RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.client_id)
        .bind(new.psychiatrist_id)
        .bind(new.scheduled_for)
        .bind(new.duration_minutes.unwrap_or(DEFAULT_APPOINTMENT_MINUTES))
        .bind(new.session_type.as_str())
        .bind(new.status.unwrap_or(AppointmentStatus::Scheduled).as_str())
        .bind(&new.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;
        appointment_from_row(&row)
    }

    async fn appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let row = sqlx::query(&format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(appointment_from_row).transpose()
    }

    async fn appointments_for_client(&self, client_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE client_id = $1 ORDER BY scheduled_for ASC"
        ))
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(appointment_from_row).collect()
    }

    async fn appointments_for_psychiatrist(&self, psychiatrist_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE psychiatrist_id = $1 ORDER BY scheduled_for ASC"
        ))
        .bind(psychiatrist_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(appointment_from_row).collect()
    }

    async fn set_status(&self, id: Uuid, status: AppointmentStatus) -> Result<Option<Appointment>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE appointments SET status = $2 WHERE id = $1 RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(appointment_from_row).transpose()
    }

    async fn set_scheduled_for(&self, id: Uuid, when: OffsetDateTime) -> Result<Option<Appointment>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE appointments SET scheduled_for = $2 WHERE id = $1 RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(when)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(appointment_from_row).transpose()
    }

    async fn set_checkout_session(&self, id: Uuid, session_id: &str) -> Result<Option<Appointment>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE appointments SET checkout_session_id = $2 WHERE id = $1 RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_err)?;
        row.as_ref().map(appointment_from_row).transpose()
    }

    async fn confirm_payment(&self, session_id: &str) -> Result<Option<Appointment>, StoreError> {
        let row = sqlx::query(&format!(
            r"UPDATE appointments SET status = $2, payment_status = $3
              WHERE checkout_session_id = $1
              RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(session_id)
        .bind(AppointmentStatus::Confirmed.as_str())
        .bind(PaymentStatus::Paid.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(appointment_from_row).transpose()
    }
}

// =============================================================================
// ASSESSMENTS
// =============================================================================

#[async_trait::async_trait]
impl AssessmentStore for PgStore {
    async fn insert_assessment(&self, new: &NewAssessment) -> Result<Assessment, StoreError> {
        let row = sqlx::query(&format!(
            r"INSERT INTO assessments (id, psychiatrist_id, client_id, title, description, questions, status)
              VALUES ($1, $2, $3, $4, $5, $6, $7)
              RETURNING {ASSESSMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.psychiatrist_id)
        .bind(new.client_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(Json(&new.questions))
        .bind(new.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;
        assessment_from_row(&row)
    }

    async fn assessment(&self, id: Uuid) -> Result<Option<Assessment>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ASSESSMENT_COLUMNS} FROM assessments WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(assessment_from_row).transpose()
    }

    async fn assessments_for_client(&self, client_id: Uuid) -> Result<Vec<Assessment>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ASSESSMENT_COLUMNS} FROM assessments WHERE client_id = $1 ORDER BY created_at DESC"
        ))
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(assessment_from_row).collect()
    }

    async fn assessments_for_psychiatrist(&self, psychiatrist_id: Uuid) -> Result<Vec<Assessment>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ASSESSMENT_COLUMNS} FROM assessments WHERE psychiatrist_id = $1 ORDER BY created_at DESC"
        ))
        .bind(psychiatrist_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(assessment_from_row).collect()
    }

    async fn update_assessment(&self, id: Uuid, patch: &AssessmentPatch) -> Result<Option<Assessment>, StoreError> {
        let row = sqlx::query(&format!(
            r"UPDATE assessments SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                questions = COALESCE($4, questions),
                status = COALESCE($5, status),
                score = COALESCE($6, score),
                max_score = COALESCE($7, max_score),
                results = COALESCE($8, results),
                completed_at = COALESCE($9, completed_at)
              WHERE id = $1
              RETURNING {ASSESSMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(patch.questions.as_ref().map(Json))
        .bind(patch.status.map(AssessmentStatus::as_str))
        .bind(patch.score)
        .bind(patch.max_score)
        .bind(&patch.results)
        .bind(patch.completed_at)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(assessment_from_row).transpose()
    }

    async fn delete_assessment(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM assessments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_response(
        &self,
        assessment_id: Uuid,
        client_id: Uuid,
        answers: &[Answer],
    ) -> Result<AssessmentResponse, StoreError> {
        let row = sqlx::query(
            r"INSERT INTO assessment_responses (id, assessment_id, client_id, answers)
              VALUES ($1, $2, $3, $4)
              RETURNING id, assessment_id, client_id, answers, submitted_at",
        )
        .bind(Uuid::new_v4())
        .bind(assessment_id)
        .bind(client_id)
        .bind(Json(answers))
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;
        response_from_row(&row)
    }

    async fn responses_for(&self, assessment_id: Uuid) -> Result<Vec<AssessmentResponse>, StoreError> {
        let rows = sqlx::query(
            r"SELECT id, assessment_id, client_id, answers, submitted_at
              FROM assessment_responses WHERE assessment_id = $1 ORDER BY submitted_at ASC",
        )
        .bind(assessment_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(response_from_row).collect()
    }
}

// =============================================================================
// LIVE SESSIONS
// =============================================================================

#[async_trait::async_trait]
impl SessionStore for PgStore {
    async fn insert_live_session(
        &self,
        appointment_id: Uuid,
        room_id: &str,
        started_at: OffsetDateTime,
    ) -> Result<Session, StoreError> {
        // sessions_one_live_per_appointment turns a second live row into 23505.
        let row = sqlx::query(&format!(
            r"INSERT INTO sessions (id, appointment_id, status, room_id, started_at)
              VALUES ($1, $2, $5, $3, $4)
              RETURNING {SESSION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(appointment_id)
        .bind(room_id)
        .bind(started_at)
        .bind(SessionStatus::Live.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;
        session_from_row(&row)
    }

    async fn session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn live_session_for_appointment(&self, appointment_id: Uuid) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE appointment_id = $1 AND status = $2"
        ))
        .bind(appointment_id)
        .bind(SessionStatus::Live.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn end_session(&self, id: Uuid, ended_at: OffsetDateTime) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE sessions SET status = $3, ended_at = $2 WHERE id = $1 RETURNING {SESSION_COLUMNS}"
        ))
        .bind(id)
        .bind(ended_at)
        .bind(SessionStatus::Ended.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn live_sessions_for_psychiatrist(&self, psychiatrist_id: Uuid) -> Result<Vec<Session>, StoreError> {
        let rows = sqlx::query(
            r"SELECT s.id, s.appointment_id, s.status, s.room_id, s.started_at, s.ended_at
              FROM sessions s
              JOIN appointments a ON a.id = s.appointment_id
              WHERE a.psychiatrist_id = $1 AND s.status = $2
              ORDER BY s.started_at ASC",
        )
        .bind(psychiatrist_id)
        .bind(SessionStatus::Live.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(session_from_row).collect()
    }
}

// =============================================================================
// NOTIFICATIONS / PROGRESS / SETTINGS
// =============================================================================

#[async_trait::async_trait]
impl NotificationStore for PgStore {
    async fn insert_notification(&self, new: &NewNotification) -> Result<Notification, StoreError> {
        let row = sqlx::query(&format!(
            r"INSERT INTO notifications (id, user_id, title, message, kind, metadata)
              VALUES ($1, $2, $3, $4, $5, $6)
              RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(&new.title)
        .bind(&new.message)
        .bind(&new.kind)
        .bind(&new.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;
        Ok(notification_from_row(&row))
    }

    async fn notifications_for(&self, user_id: Uuid) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(notification_from_row).collect())
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Option<Notification>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2 RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(notification_from_row))
    }
}

#[async_trait::async_trait]
impl ProgressStore for PgStore {
    async fn progress_for_client(&self, client_id: Uuid) -> Result<Option<ProgressMetrics>, StoreError> {
        let row = sqlx::query(
            r"SELECT client_id, current_score, previous_score, trend, insights, assessment_count, session_count, updated_at
              FROM progress_metrics WHERE client_id = $1",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| {
            Ok(ProgressMetrics {
                client_id: r.get("client_id"),
                current_score: r.get("current_score"),
                previous_score: r.get("previous_score"),
                trend: Trend::parse_lenient(r.get::<&str, _>("trend")),
                insights: json_col("progress_metrics", r.get("insights"))?,
                assessment_count: r.get("assessment_count"),
                session_count: r.get("session_count"),
                updated_at: r.get("updated_at"),
            })
        })
        .transpose()
    }

    async fn upsert_progress(&self, metrics: &ProgressMetrics) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO progress_metrics
                (client_id, current_score, previous_score, trend, insights, assessment_count, session_count, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
              ON CONFLICT (client_id) DO UPDATE SET
                current_score = EXCLUDED.current_score,
                previous_score = EXCLUDED.previous_score,
                trend = EXCLUDED.trend,
                insights = EXCLUDED.insights,
                assessment_count = EXCLUDED.assessment_count,
                session_count = EXCLUDED.session_count,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(metrics.client_id)
        .bind(metrics.current_score)
        .bind(metrics.previous_score)
        .bind(metrics.trend.as_str())
        .bind(Json(&metrics.insights))
        .bind(metrics.assessment_count)
        .bind(metrics.session_count)
        .bind(metrics.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SettingsStore for PgStore {
    async fn setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM website_settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO website_settings (key, value, updated_at) VALUES ($1, $2, now())
              ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
