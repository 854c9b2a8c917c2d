//! PostgreSQL implementation of NotificationStore.
//!
//! Roles are stored as their numeric codes; `path_data` is JSONB.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::domain::foundation::{
    DomainError, ErrorCode, NotificationId, Role, Timestamp, UserId,
};
use crate::domain::notification::{
    Audience, NewNotification, Notification, NotificationPage, PageRequest, Recipient, Sender,
};
use crate::ports::NotificationStore;

const COLUMNS: &str = "id, title, message, sender_user_id, sender_role, recipient_user_id, \
                       recipient_role, recipient_is_group, route_path, path_data, read, seen, \
                       created_at, updated_at";

/// PostgreSQL implementation of NotificationStore.
#[derive(Clone)]
pub struct PostgresNotificationStore {
    pool: PgPool,
}

impl PostgresNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> Result<(), DomainError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to run migrations", e))
    }
}

/// SQL predicate selecting an audience, with the user id to bind at `$param`.
fn audience_clause(audience: &Audience, param: usize) -> (String, Option<&str>) {
    match audience {
        Audience::AdminGroup => (
            format!(
                "recipient_is_group = TRUE AND recipient_role = {}",
                Role::Admin.code()
            ),
            None,
        ),
        Audience::User(user_id) => (
            format!(
                "recipient_is_group = FALSE AND recipient_user_id = ${}",
                param
            ),
            Some(user_id.as_str()),
        ),
    }
}

fn role_code(role: Role) -> i16 {
    i16::from(role.code())
}

#[async_trait]
impl NotificationStore for PostgresNotificationStore {
    async fn create(&self, new: NewNotification) -> Result<Notification, DomainError> {
        let notification = Notification::create(new, NotificationId::new(), Timestamp::now());

        sqlx::query(&format!(
            "INSERT INTO notifications ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
            COLUMNS
        ))
        .bind(notification.id.as_uuid())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.sender.user_id.as_ref().map(UserId::as_str))
        .bind(role_code(notification.sender.role))
        .bind(notification.recipient.user_id.as_ref().map(UserId::as_str))
        .bind(role_code(notification.recipient.role))
        .bind(notification.recipient.is_group)
        .bind(&notification.route_path)
        .bind(Json(&notification.path_data))
        .bind(notification.read)
        .bind(notification.seen)
        .bind(notification.created_at.as_datetime())
        .bind(notification.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to insert notification", e))?;

        Ok(notification)
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        role: Role,
        page: PageRequest,
    ) -> Result<NotificationPage, DomainError> {
        let filter = "(recipient_is_group = FALSE AND recipient_user_id = $1) \
                      OR (recipient_is_group = TRUE AND recipient_role = $2)";

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM notifications WHERE {}",
            filter
        ))
        .bind(user_id.as_str())
        .bind(role_code(role.group_tier()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to count user notifications", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE {} \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4",
            COLUMNS, filter
        ))
        .bind(user_id.as_str())
        .bind(role_code(role.group_tier()))
        .bind(i64::from(page.limit()))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch user notifications", e))?;

        let items = rows
            .into_iter()
            .map(row_to_notification)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NotificationPage::new(items, page, total.max(0) as u64))
    }

    async fn list_for_admin(&self, page: PageRequest) -> Result<NotificationPage, DomainError> {
        let (filter, _) = audience_clause(&Audience::AdminGroup, 1);

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM notifications WHERE {}",
            filter
        ))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to count admin notifications", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE {} \
             ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
            COLUMNS, filter
        ))
        .bind(i64::from(page.limit()))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch admin notifications", e))?;

        let items = rows
            .into_iter()
            .map(row_to_notification)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NotificationPage::new(items, page, total.max(0) as u64))
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<Notification, DomainError> {
        let now = Timestamp::now();
        let row = sqlx::query(&format!(
            "UPDATE notifications SET read = TRUE, updated_at = $2 WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id.as_uuid())
        .bind(now.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to mark notification read", e))?;

        match row {
            Some(row) => row_to_notification(row),
            None => Err(DomainError::new(
                ErrorCode::NotificationNotFound,
                format!("Notification {} not found", id),
            )),
        }
    }

    async fn mark_all_seen(&self, audience: &Audience) -> Result<u64, DomainError> {
        let now = Timestamp::now();
        let (filter, user_id) = audience_clause(audience, 2);
        let sql = format!(
            "UPDATE notifications SET seen = TRUE, updated_at = $1 WHERE seen = FALSE AND {}",
            filter
        );

        let mut query = sqlx::query(&sql).bind(now.as_datetime());
        if let Some(user_id) = user_id {
            query = query.bind(user_id);
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to mark notifications seen", e))?;
        Ok(result.rows_affected())
    }

    async fn count_unseen(&self, audience: &Audience) -> Result<u64, DomainError> {
        let (filter, user_id) = audience_clause(audience, 1);
        let sql = format!(
            "SELECT COUNT(*) FROM notifications WHERE seen = FALSE AND {}",
            filter
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        if let Some(user_id) = user_id {
            query = query.bind(user_id);
        }

        let count = query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to count unseen notifications", e))?;
        Ok(count.max(0) as u64)
    }

    async fn delete(&self, id: &NotificationId) -> Result<(), DomainError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to delete notification", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::NotificationNotFound,
                format!("Notification {} not found", id),
            ));
        }
        Ok(())
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| DomainError::database(&format!("Failed to get {}", name), e))
}

fn role_column(row: &PgRow, name: &str) -> Result<Role, DomainError> {
    let code: i16 = column(row, name)?;
    u8::try_from(code)
        .ok()
        .and_then(Role::from_code)
        .ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid role code {} in column {}", code, name),
            )
        })
}

fn user_column(row: &PgRow, name: &str) -> Result<Option<UserId>, DomainError> {
    let raw: Option<String> = column(row, name)?;
    raw.map(UserId::new)
        .transpose()
        .map_err(|e| DomainError::database(&format!("Invalid {}", name), e))
}

fn row_to_notification(row: PgRow) -> Result<Notification, DomainError> {
    let id: uuid::Uuid = column(&row, "id")?;
    let path_data: Json<Map<String, Value>> = column(&row, "path_data")?;
    let created_at: chrono::DateTime<chrono::Utc> = column(&row, "created_at")?;
    let updated_at: chrono::DateTime<chrono::Utc> = column(&row, "updated_at")?;

    Ok(Notification {
        id: NotificationId::from_uuid(id),
        title: column(&row, "title")?,
        message: column(&row, "message")?,
        sender: Sender {
            user_id: user_column(&row, "sender_user_id")?,
            role: role_column(&row, "sender_role")?,
        },
        recipient: Recipient {
            user_id: user_column(&row, "recipient_user_id")?,
            role: role_column(&row, "recipient_role")?,
            is_group: column(&row, "recipient_is_group")?,
        },
        route_path: column(&row, "route_path")?,
        path_data: path_data.0,
        read: column(&row, "read")?,
        seen: column(&row, "seen")?,
        created_at: Timestamp::from_datetime(created_at),
        updated_at: Timestamp::from_datetime(updated_at),
    })
}
