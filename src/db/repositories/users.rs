use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{
    connection::Database,
    helpers::{format_day, parse_day},
    models::{AccountType, Group, UserAccount},
};

fn load_groups(conn: &Connection, user_id: i64) -> Result<Vec<Group>> {
    let mut stmt = conn.prepare(
        "SELECT g.id, g.name FROM member_groups g
         INNER JOIN user_groups ug ON ug.group_id = g.id
         WHERE ug.user_id = ?1
         ORDER BY g.id ASC",
    )?;
    let mut rows = stmt.query(params![user_id])?;
    let mut groups = Vec::new();
    while let Some(row) = rows.next()? {
        groups.push(Group {
            id: row.get(0)?,
            name: row.get(1)?,
        });
    }
    Ok(groups)
}

impl Database {
    /// Store the account returned by a login, replacing any previous one.
    /// Groups are upserted by id and linked to the new account.
    pub async fn save_login(&self, account: UserAccount, groups: Vec<Group>) -> Result<UserAccount> {
        self.transaction(move |tx| {
            tx.execute("DELETE FROM users", [])
                .with_context(|| "failed to clear previous account")?;

            for group in &groups {
                tx.execute(
                    "INSERT INTO member_groups (id, name) VALUES (?1, ?2)
                     ON CONFLICT(id) DO UPDATE SET name = excluded.name",
                    params![group.id, group.name],
                )
                .with_context(|| format!("failed to upsert group {}", group.id))?;
            }

            tx.execute(
                "INSERT INTO users (first_name, last_name, date_of_birth, mrn, auth_token, account_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    account.first_name,
                    account.last_name,
                    format_day(account.date_of_birth),
                    account.mrn,
                    account.auth_token,
                    account.account_type.as_str(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert account")?;
            let user_id = tx.last_insert_rowid();

            for group in &groups {
                tx.execute(
                    "INSERT OR IGNORE INTO user_groups (user_id, group_id) VALUES (?1, ?2)",
                    params![user_id, group.id],
                )?;
            }

            let stored_groups = load_groups(tx, user_id)?;

            Ok(UserAccount {
                id: Some(user_id),
                groups: stored_groups,
                ..account
            })
        })
        .await
    }

    pub async fn current_user(&self) -> Result<Option<UserAccount>> {
        self.execute(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, first_name, last_name, date_of_birth, mrn, auth_token, account_type
                     FROM users ORDER BY id DESC LIMIT 1",
                    [],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, Option<String>>(5)?,
                            row.get::<_, String>(6)?,
                        ))
                    },
                )
                .optional()?;

            let Some((id, first_name, last_name, dob, mrn, auth_token, account_type)) = row else {
                return Ok(None);
            };

            Ok(Some(UserAccount {
                id: Some(id),
                first_name,
                last_name,
                date_of_birth: parse_day(&dob, "date_of_birth")?,
                mrn,
                account_type: AccountType::from_raw(&account_type),
                auth_token,
                groups: load_groups(conn, id)?,
            }))
        })
        .await
    }

    /// Drop the stored token but keep the account row.
    pub async fn clear_auth_token(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute("UPDATE users SET auth_token = NULL", [])?;
            Ok(())
        })
        .await
    }

    /// Returns whether a group was removed. Memberships go with it.
    pub async fn delete_group(&self, group_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let affected = conn.execute("DELETE FROM member_groups WHERE id = ?1", params![group_id])?;
            Ok(affected > 0)
        })
        .await
    }
}
