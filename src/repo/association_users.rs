use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Association, AssociationUser};
use crate::error::{AppError, AppResult};
use crate::ids::ObjectId;

const COLUMNS: &str = "id, username, password_hash, association_id, master, owner";

fn from_row(row: &Row<'_>) -> rusqlite::Result<AssociationUser> {
    Ok(AssociationUser {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        association: row.get(3)?,
        master: row.get(4)?,
        owner: row.get(5)?,
    })
}

/// Create the login account for `association`. The username is the
/// association's email, lower-cased.
pub fn create(
    conn: &Connection,
    association: &Association,
    password: &str,
    master: bool,
    owner: Option<&ObjectId>,
    bcrypt_cost: u32,
) -> AppResult<AssociationUser> {
    let username = association.email.trim().to_lowercase();
    if username.is_empty() {
        return Err(AppError::BadRequest(
            "Association needs an email to log in".into(),
        ));
    }
    if password.is_empty() {
        return Err(AppError::BadRequest("Password is required".into()));
    }
    if find_by_username(conn, &username)?.is_some() {
        return Err(AppError::Conflict("Association user already exists".into()));
    }

    let id = ObjectId::generate();
    let password_hash = bcrypt::hash(password, bcrypt_cost)?;
    conn.execute(
        "INSERT INTO association_users (id, username, password_hash, association_id, master, owner)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, username, password_hash, association.id, master, owner],
    )?;
    tracing::info!(
        account = %id,
        association = %association.id,
        master,
        "Association user created"
    );
    get(conn, &id)
}

pub fn find(conn: &Connection, id: &ObjectId) -> AppResult<Option<AssociationUser>> {
    let account = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM association_users WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    Ok(account)
}

pub fn get(conn: &Connection, id: &ObjectId) -> AppResult<AssociationUser> {
    find(conn, id)?.ok_or_else(|| AppError::not_found("Association user"))
}

pub fn find_by_username(conn: &Connection, username: &str) -> AppResult<Option<AssociationUser>> {
    let account = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM association_users WHERE username = ?1 COLLATE NOCASE"),
            [username],
            from_row,
        )
        .optional()?;
    Ok(account)
}

/// Verify a username/password pair. Unknown usernames and wrong passwords
/// are indistinguishable to the caller.
pub fn check_login(conn: &Connection, username: &str, password: &str) -> AppResult<AssociationUser> {
    let Some(account) = find_by_username(conn, username.trim())? else {
        return Err(AppError::Unauthenticated);
    };
    if bcrypt::verify(password, &account.password_hash)? {
        Ok(account)
    } else {
        Err(AppError::Unauthenticated)
    }
}

/// Associations whose accounts were created by `owner`.
pub fn my_associations(conn: &Connection, owner: &ObjectId) -> AppResult<Vec<ObjectId>> {
    crate::repo::id_list(
        conn,
        "SELECT association_id FROM association_users WHERE owner = ?1 ORDER BY rowid",
        owner,
    )
}

/// Delete the association's accounts, returning their ids.
pub(crate) fn delete_for_association(
    conn: &Connection,
    association: &ObjectId,
) -> AppResult<Vec<ObjectId>> {
    let ids = crate::repo::id_list(
        conn,
        "SELECT id FROM association_users WHERE association_id = ?1 ORDER BY rowid",
        association,
    )?;
    conn.execute(
        "DELETE FROM association_users WHERE association_id = ?1",
        [association],
    )?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::models::AssociationInput;
    use crate::repo::associations;

    fn association(conn: &Connection, email: &str) -> Association {
        associations::create(
            conn,
            &AssociationInput {
                name: "Club".into(),
                email: email.into(),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn create_hashes_password_and_uses_email() {
        let (pool, _tmp) = db::test_pool();
        let conn = pool.get().unwrap();
        let club = association(&conn, "Club@Example.org");

        let account = create(&conn, &club, "hunter2", false, None, 4).unwrap();
        assert_eq!(account.username, "club@example.org");
        assert_ne!(account.password_hash, "hunter2");
        assert_eq!(account.association, club.id);
        assert!(!account.master);
    }

    #[test]
    fn duplicate_username_is_conflict() {
        let (pool, _tmp) = db::test_pool();
        let conn = pool.get().unwrap();
        let club = association(&conn, "club@example.org");
        create(&conn, &club, "a", false, None, 4).unwrap();
        let err = create(&conn, &club, "b", false, None, 4).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn check_login_accepts_right_password_only() {
        let (pool, _tmp) = db::test_pool();
        let conn = pool.get().unwrap();
        let club = association(&conn, "club@example.org");
        let account = create(&conn, &club, "hunter2", true, None, 4).unwrap();

        let ok = check_login(&conn, "CLUB@example.org", "hunter2").unwrap();
        assert_eq!(ok.id, account.id);

        assert!(matches!(
            check_login(&conn, "club@example.org", "wrong"),
            Err(AppError::Unauthenticated)
        ));
        assert!(matches!(
            check_login(&conn, "nobody@example.org", "hunter2"),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn my_associations_filters_by_owner() {
        let (pool, _tmp) = db::test_pool();
        let conn = pool.get().unwrap();
        let admin = association(&conn, "admin@example.org");
        let admin_account = create(&conn, &admin, "root", true, None, 4).unwrap();

        let chess = association(&conn, "chess@example.org");
        create(&conn, &chess, "p", false, Some(&admin_account.id), 4).unwrap();
        let other = association(&conn, "other@example.org");
        create(&conn, &other, "p", false, None, 4).unwrap();

        assert_eq!(my_associations(&conn, &admin_account.id).unwrap(), vec![chess.id]);
    }
}
