//! PostgreSQL storage on `sqlx`.

use super::{
    like_pattern, models::duplicate, Account, AccountDraft, AccountStore, PersonalData,
    PersonalDataStore, Project, ProjectDraft, ProjectStore, Repository, Role, SocialLink,
    SocialLinkDraft, SocialLinkStore, StoreError, TechStackPosition, WriteError,
};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgConnection, PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

const SCHEMA: &str = include_str!("../../../sql/schema.sql");

/// Create tables and constraints if they do not exist yet.
///
/// # Errors
/// Returns the database error when a statement fails.
pub async fn apply_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

#[derive(Clone, Debug)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Form field guarded by a unique constraint.
fn constraint_field(constraint: &str) -> Option<&'static str> {
    match constraint {
        "projects_name_key" | "projects_external_id_key" => Some("github_project"),
        "accounts_login_key" => Some("login"),
        "accounts_email_key" => Some("email"),
        "social_links_paraphrase_key" => Some("paraphrase"),
        "social_links_link_key" => Some("link"),
        _ => None,
    }
}

fn write_error(err: sqlx::Error) -> WriteError {
    if is_unique_violation(&err) {
        let field = match &err {
            sqlx::Error::Database(db_err) => db_err.constraint().and_then(constraint_field),
            _ => None,
        };
        if let Some(field) = field {
            return WriteError::Validation(duplicate(field));
        }
    }
    WriteError::from(err)
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn offset(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn not_found_if_empty(rows_affected: u64) -> Result<(), StoreError> {
    if rows_affected == 0 {
        Err(StoreError::NotFound)
    } else {
        Ok(())
    }
}

// Projects

fn project_row(row: &PgRow) -> Result<Project, sqlx::Error> {
    Ok(Project {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        name: row.try_get("name")?,
        alternative_name: row.try_get("alternative_name")?,
        description: row.try_get("description")?,
        tech_stack: Vec::new(),
    })
}

async fn attach_tech_stack(
    conn: &mut PgConnection,
    projects: &mut [Project],
) -> Result<(), sqlx::Error> {
    if projects.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = projects.iter().map(|project| project.id).collect();
    let rows = sqlx::query(
        r"
        SELECT project_id, pos, name
        FROM project_tech_stack
        WHERE project_id = ANY($1)
        ORDER BY project_id, pos
        ",
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut stacks: HashMap<Uuid, Vec<TechStackPosition>> = HashMap::new();
    for row in rows {
        let project_id: Uuid = row.try_get("project_id")?;
        stacks.entry(project_id).or_default().push(TechStackPosition {
            pos: row.try_get("pos")?,
            name: row.try_get("name")?,
        });
    }
    for project in projects.iter_mut() {
        project.tech_stack = stacks.remove(&project.id).unwrap_or_default();
    }
    Ok(())
}

async fn insert_tech_stack(
    tx: &mut Transaction<'_, Postgres>,
    project_id: Uuid,
    tech_stack: &[TechStackPosition],
) -> Result<(), sqlx::Error> {
    for position in tech_stack {
        sqlx::query("INSERT INTO project_tech_stack (project_id, pos, name) VALUES ($1, $2, $3)")
            .bind(project_id)
            .bind(position.pos)
            .bind(&position.name)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn fetch_project(conn: &mut PgConnection, id: Uuid) -> Result<Option<Project>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, external_id, name, alternative_name, description FROM projects WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(project_row).transpose()
}

impl ProjectStore for PgRepository {
    #[instrument(skip(self))]
    async fn count_projects(&self, filter: &str) -> Result<u64, StoreError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM projects WHERE name ILIKE $1 OR alternative_name ILIKE $1",
        )
        .bind(like_pattern(filter))
        .fetch_one(&self.pool)
        .await?;
        Ok(count(total))
    }

    #[instrument(skip(self))]
    async fn find_projects(
        &self,
        filter: &str,
        offset_by: u64,
        limit: u32,
    ) -> Result<Vec<Project>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, external_id, name, alternative_name, description
            FROM projects
            WHERE name ILIKE $1 OR alternative_name ILIKE $1
            ORDER BY created_at, name
            OFFSET $2 LIMIT $3
            ",
        )
        .bind(like_pattern(filter))
        .bind(offset(offset_by))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut projects = rows
            .iter()
            .map(project_row)
            .collect::<Result<Vec<_>, _>>()?;
        let mut conn = self.pool.acquire().await?;
        attach_tech_stack(&mut conn, &mut projects).await?;
        Ok(projects)
    }

    #[instrument(skip(self))]
    async fn project_names(&self) -> Result<Vec<String>, StoreError> {
        let names = sqlx::query_scalar("SELECT name FROM projects ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    #[instrument(skip(self))]
    async fn get_project(&self, id: Uuid) -> Result<Project, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let mut project = fetch_project(&mut conn, id)
            .await?
            .ok_or(StoreError::NotFound)?;
        attach_tech_stack(&mut conn, std::slice::from_mut(&mut project)).await?;
        Ok(project)
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    async fn create_project(&self, draft: ProjectDraft) -> Result<Project, WriteError> {
        draft.validate()?;

        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r"
            INSERT INTO projects (id, external_id, name, alternative_name, description)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(id)
        .bind(draft.external_id)
        .bind(&draft.name)
        .bind(&draft.alternative_name)
        .bind(&draft.description)
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;
        insert_tech_stack(&mut tx, id, &draft.tech_stack).await?;
        tx.commit().await?;

        Ok(Project {
            id,
            external_id: draft.external_id,
            name: draft.name,
            alternative_name: draft.alternative_name,
            description: draft.description,
            tech_stack: draft.tech_stack,
        })
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    async fn update_project(&self, id: Uuid, draft: ProjectDraft) -> Result<Project, WriteError> {
        draft.validate()?;

        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            r"
            UPDATE projects
            SET external_id = $2, name = $3, alternative_name = $4, description = $5
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(draft.external_id)
        .bind(&draft.name)
        .bind(&draft.alternative_name)
        .bind(&draft.description)
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;
        not_found_if_empty(updated.rows_affected())?;

        sqlx::query("DELETE FROM project_tech_stack WHERE project_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_tech_stack(&mut tx, id, &draft.tech_stack).await?;
        tx.commit().await?;

        Ok(Project {
            id,
            external_id: draft.external_id,
            name: draft.name,
            alternative_name: draft.alternative_name,
            description: draft.description,
            tech_stack: draft.tech_stack,
        })
    }

    #[instrument(skip(self))]
    async fn delete_project(&self, id: Uuid) -> Result<Project, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut project = fetch_project(&mut tx, id)
            .await?
            .ok_or(StoreError::NotFound)?;
        attach_tech_stack(&mut tx, std::slice::from_mut(&mut project)).await?;
        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(project)
    }
}

// Accounts

const ACCOUNT_COLUMNS: &str = "id, login, email, role, password_hash, is_first_login, \
     reset_token, reset_token_expires_at";

fn account_row(row: &PgRow) -> Result<Account, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(Account {
        id: row.try_get("id")?,
        login: row.try_get("login")?,
        email: row.try_get("email")?,
        role: role.parse::<Role>().map_err(|e| sqlx::Error::Decode(e.into()))?,
        password_hash: row.try_get("password_hash")?,
        is_first_login: row.try_get("is_first_login")?,
        reset_token: row.try_get("reset_token")?,
        reset_token_expires_at: row.try_get("reset_token_expires_at")?,
    })
}

impl AccountStore for PgRepository {
    #[instrument(skip(self))]
    async fn count_accounts(&self, filter: &str) -> Result<u64, StoreError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE login ILIKE $1 OR email ILIKE $1")
                .bind(like_pattern(filter))
                .fetch_one(&self.pool)
                .await?;
        Ok(count(total))
    }

    #[instrument(skip(self))]
    async fn find_accounts(
        &self,
        filter: &str,
        offset_by: u64,
        limit: u32,
    ) -> Result<Vec<Account>, StoreError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE login ILIKE $1 OR email ILIKE $1 \
             ORDER BY created_at, login OFFSET $2 LIMIT $3"
        );
        let rows = sqlx::query(&sql)
            .bind(like_pattern(filter))
            .bind(offset(offset_by))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(account_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    #[instrument(skip(self))]
    async fn get_account(&self, id: Uuid) -> Result<Account, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(account_row(&row)?)
    }

    #[instrument(skip(self))]
    async fn find_account_by_identity(&self, identity: &str) -> Result<Option<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE login = $1 OR email = $1");
        let row = sqlx::query(&sql)
            .bind(identity)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(account_row).transpose()?)
    }

    #[instrument(skip(self, token))]
    async fn find_account_by_reset_token(&self, token: &str) -> Result<Option<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE reset_token = $1");
        let row = sqlx::query(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(account_row).transpose()?)
    }

    #[instrument(skip(self, draft), fields(login = %draft.login))]
    async fn create_account(&self, draft: AccountDraft) -> Result<Account, WriteError> {
        draft.validate()?;

        let id = Uuid::new_v4();
        sqlx::query(
            r"
            INSERT INTO accounts (id, login, email, role, password_hash, is_first_login)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            ",
        )
        .bind(id)
        .bind(&draft.login)
        .bind(&draft.email)
        .bind(draft.role.as_str())
        .bind(&draft.password_hash)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(Account {
            id,
            login: draft.login,
            email: draft.email,
            role: draft.role,
            password_hash: draft.password_hash,
            is_first_login: true,
            reset_token: None,
            reset_token_expires_at: None,
        })
    }

    #[instrument(skip(self, password_hash))]
    async fn replace_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE accounts
            SET password_hash = $2, is_first_login = FALSE,
                reset_token = NULL, reset_token_expires_at = NULL
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        not_found_if_empty(result.rows_affected())
    }

    #[instrument(skip(self, token))]
    async fn set_reset_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE accounts SET reset_token = $2, reset_token_expires_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        not_found_if_empty(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn delete_account(&self, id: Uuid) -> Result<Account, StoreError> {
        let sql = format!("DELETE FROM accounts WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(account_row(&row)?)
    }
}

// Personal data

impl PersonalDataStore for PgRepository {
    #[instrument(skip(self))]
    async fn personal_data(&self) -> Result<Option<PersonalData>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT description_top, description_bottom, maven_central_link,
                   github_account_link, first_email, second_email, github_name
            FROM personal_data WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(PersonalData {
            description_top: row.try_get("description_top")?,
            description_bottom: row.try_get("description_bottom")?,
            maven_central_link: row.try_get("maven_central_link")?,
            github_account_link: row.try_get("github_account_link")?,
            first_email: row.try_get("first_email")?,
            second_email: row.try_get("second_email")?,
            github_name: row.try_get("github_name")?,
        }))
    }

    #[instrument(skip(self, data))]
    async fn save_personal_data(&self, data: PersonalData) -> Result<PersonalData, WriteError> {
        data.validate()?;

        sqlx::query(
            r"
            INSERT INTO personal_data (
                id, description_top, description_bottom, maven_central_link,
                github_account_link, first_email, second_email, github_name
            )
            VALUES (1, $1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                description_top = EXCLUDED.description_top,
                description_bottom = EXCLUDED.description_bottom,
                maven_central_link = EXCLUDED.maven_central_link,
                github_account_link = EXCLUDED.github_account_link,
                first_email = EXCLUDED.first_email,
                second_email = EXCLUDED.second_email,
                github_name = EXCLUDED.github_name
            ",
        )
        .bind(&data.description_top)
        .bind(&data.description_bottom)
        .bind(&data.maven_central_link)
        .bind(&data.github_account_link)
        .bind(&data.first_email)
        .bind(&data.second_email)
        .bind(&data.github_name)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(data)
    }
}

// Social links

fn social_link_row(row: &PgRow) -> Result<SocialLink, sqlx::Error> {
    Ok(SocialLink {
        id: row.try_get("id")?,
        paraphrase: row.try_get("paraphrase")?,
        link: row.try_get("link")?,
        icon_class: row.try_get("icon_class")?,
    })
}

impl SocialLinkStore for PgRepository {
    #[instrument(skip(self))]
    async fn count_social_links(&self, filter: &str) -> Result<u64, StoreError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM social_links WHERE paraphrase ILIKE $1 OR link ILIKE $1",
        )
        .bind(like_pattern(filter))
        .fetch_one(&self.pool)
        .await?;
        Ok(count(total))
    }

    #[instrument(skip(self))]
    async fn find_social_links(
        &self,
        filter: &str,
        offset_by: u64,
        limit: u32,
    ) -> Result<Vec<SocialLink>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, paraphrase, link, icon_class
            FROM social_links
            WHERE paraphrase ILIKE $1 OR link ILIKE $1
            ORDER BY created_at, paraphrase
            OFFSET $2 LIMIT $3
            ",
        )
        .bind(like_pattern(filter))
        .bind(offset(offset_by))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(social_link_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    #[instrument(skip(self))]
    async fn get_social_link(&self, id: Uuid) -> Result<SocialLink, StoreError> {
        let row = sqlx::query("SELECT id, paraphrase, link, icon_class FROM social_links WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(social_link_row(&row)?)
    }

    #[instrument(skip(self, draft))]
    async fn create_social_link(&self, draft: SocialLinkDraft) -> Result<SocialLink, WriteError> {
        draft.validate()?;

        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO social_links (id, paraphrase, link, icon_class) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(&draft.paraphrase)
        .bind(&draft.link)
        .bind(&draft.icon_class)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(SocialLink {
            id,
            paraphrase: draft.paraphrase,
            link: draft.link,
            icon_class: draft.icon_class,
        })
    }

    #[instrument(skip(self, draft))]
    async fn update_social_link(
        &self,
        id: Uuid,
        draft: SocialLinkDraft,
    ) -> Result<SocialLink, WriteError> {
        draft.validate()?;

        let result = sqlx::query(
            "UPDATE social_links SET paraphrase = $2, link = $3, icon_class = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(&draft.paraphrase)
        .bind(&draft.link)
        .bind(&draft.icon_class)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        not_found_if_empty(result.rows_affected())?;

        Ok(SocialLink {
            id,
            paraphrase: draft.paraphrase,
            link: draft.link,
            icon_class: draft.icon_class,
        })
    }

    #[instrument(skip(self))]
    async fn delete_social_link(&self, id: Uuid) -> Result<SocialLink, StoreError> {
        let row = sqlx::query(
            "DELETE FROM social_links WHERE id = $1 RETURNING id, paraphrase, link, icon_class",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;
        Ok(social_link_row(&row)?)
    }
}

impl Repository for PgRepository {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
