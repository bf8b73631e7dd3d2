use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Comment, CommentInput, Post, PostInput, Tag, User};
use crate::error::{AppError, AppResult};
use crate::ids::ObjectId;
use crate::repo::{associations, contains_pattern, id_list, json_column, notifications, users};

/// How many posts the feed returns.
pub const FEED_LIMIT: usize = 50;

const COLUMNS: &str = "id, title, association_id, description, date, image, image_size";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        association: row.get(2)?,
        description: row.get(3)?,
        date: row.get(4)?,
        likes: Vec::new(),
        comments: Vec::new(),
        image: row.get(5)?,
        image_size: json_column(row, 6)?,
    })
}

fn load_edges(conn: &Connection, mut post: Post) -> AppResult<Post> {
    post.likes = liker_ids(conn, &post.id)?;
    post.comments = comments(conn, &post.id)?;
    Ok(post)
}

fn collect(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> AppResult<Vec<Post>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(|p| load_edges(conn, p)).collect()
}

pub fn liker_ids(conn: &Connection, id: &ObjectId) -> AppResult<Vec<ObjectId>> {
    id_list(
        conn,
        "SELECT user_id FROM post_likes WHERE post_id = ?1 ORDER BY rowid",
        id,
    )
}

fn tags(conn: &Connection, comment: &ObjectId) -> AppResult<Vec<Tag>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, user_id, name FROM comment_tags WHERE comment_id = ?1 ORDER BY rowid",
    )?;
    let tags = stmt
        .query_map([comment], |row| {
            Ok(Tag {
                id: row.get(0)?,
                user: row.get(1)?,
                name: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        user: row.get(1)?,
        content: row.get(2)?,
        date: row.get(3)?,
        tags: Vec::new(),
        reports: row.get(4)?,
    })
}

/// Comments of a post in the order they were written.
fn comments(conn: &Connection, post: &ObjectId) -> AppResult<Vec<Comment>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, user_id, content, date, reports FROM comments
         WHERE post_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([post], comment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|mut c| {
            c.tags = tags(conn, &c.id)?;
            Ok(c)
        })
        .collect()
}

/// Insert the post, dated `now`, and link it into its association.
pub fn create(conn: &Connection, input: &PostInput, now: DateTime<Utc>) -> AppResult<Post> {
    if input.title.trim().is_empty() {
        return Err(AppError::BadRequest("Post title is required".into()));
    }
    associations::get(conn, &input.association)?;

    let id = ObjectId::generate();
    conn.execute(
        "INSERT INTO posts (id, title, association_id, description, date, image, image_size)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            input.title,
            input.association,
            input.description,
            now,
            input.image,
            serde_json::to_string(&input.image_size)?,
        ],
    )?;
    associations::add_post(conn, &input.association, &id)?;

    tracing::info!(post = %id, association = %input.association, "Post created");
    get(conn, &id)
}

pub fn find(conn: &Connection, id: &ObjectId) -> AppResult<Option<Post>> {
    let post = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM posts WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    post.map(|p| load_edges(conn, p)).transpose()
}

pub fn get(conn: &Connection, id: &ObjectId) -> AppResult<Post> {
    find(conn, id)?.ok_or_else(|| AppError::not_found("Post"))
}

/// Newest posts first, at most `limit` of them.
pub fn latest(conn: &Connection, limit: usize) -> AppResult<Vec<Post>> {
    collect(
        conn,
        &format!("SELECT {COLUMNS} FROM posts ORDER BY date DESC, rowid DESC LIMIT ?1"),
        [limit as i64],
    )
}

pub fn search(conn: &Connection, term: &str) -> AppResult<Vec<Post>> {
    collect(
        conn,
        &format!(
            "SELECT {COLUMNS} FROM posts
             WHERE title LIKE ?1 ESCAPE '\\' OR description LIKE ?1 ESCAPE '\\'
             ORDER BY date DESC"
        ),
        [contains_pattern(term)],
    )
}

/// Overwrite title, description and image. Likes, comments, date and the
/// owning association stay as they are.
pub fn update(conn: &Connection, id: &ObjectId, input: &PostInput) -> AppResult<Post> {
    let changed = conn.execute(
        "UPDATE posts SET title = ?2, description = ?3, image = ?4, image_size = ?5
         WHERE id = ?1",
        params![
            id,
            input.title,
            input.description,
            input.image,
            serde_json::to_string(&input.image_size)?,
        ],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("Post"));
    }
    get(conn, id)
}

pub(crate) fn remove(conn: &Connection, id: &ObjectId) -> AppResult<()> {
    conn.execute("DELETE FROM comments WHERE post_id = ?1", [id])?;
    conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
    Ok(())
}

// -- Likes --

pub fn like(conn: &Connection, id: &ObjectId, user: &ObjectId) -> AppResult<(Post, User)> {
    get(conn, id)?;
    users::ensure_exists(conn, user)?;

    conn.execute(
        "INSERT OR IGNORE INTO post_likes (post_id, user_id) VALUES (?1, ?2)",
        params![id, user],
    )?;
    users::add_liked_post(conn, user, id)?;
    Ok((get(conn, id)?, users::get(conn, user)?))
}

pub fn dislike(conn: &Connection, id: &ObjectId, user: &ObjectId) -> AppResult<(Post, User)> {
    get(conn, id)?;
    users::ensure_exists(conn, user)?;

    unlink_like(conn, id, user)?;
    Ok((get(conn, id)?, users::get(conn, user)?))
}

pub(crate) fn unlink_like(conn: &Connection, id: &ObjectId, user: &ObjectId) -> AppResult<()> {
    conn.execute(
        "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
        params![id, user],
    )?;
    users::remove_liked_post(conn, user, id)?;
    Ok(())
}

// -- Comments --

/// Append a comment to the post. The comment and each tag get fresh ids;
/// the author and every tagged user must exist.
pub fn comment(
    conn: &Connection,
    id: &ObjectId,
    input: &CommentInput,
    now: DateTime<Utc>,
) -> AppResult<(Post, Comment)> {
    get(conn, id)?;
    users::ensure_exists(conn, &input.user)?;
    for tag in &input.tags {
        users::ensure_exists(conn, &tag.user)?;
    }

    let comment_id = ObjectId::generate();
    conn.execute(
        "INSERT INTO comments (id, post_id, user_id, content, date) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![comment_id, id, input.user, input.content, now],
    )?;
    for tag in &input.tags {
        conn.execute(
            "INSERT INTO comment_tags (id, comment_id, user_id, name) VALUES (?1, ?2, ?3, ?4)",
            params![ObjectId::generate(), comment_id, tag.user, tag.name],
        )?;
    }

    let comment = get_comment(conn, id, &comment_id)?;
    Ok((get(conn, id)?, comment))
}

pub fn get_comment(conn: &Connection, post: &ObjectId, id: &ObjectId) -> AppResult<Comment> {
    let comment = conn
        .query_row(
            "SELECT id, user_id, content, date, reports FROM comments
             WHERE id = ?1 AND post_id = ?2",
            params![id, post],
            comment_from_row,
        )
        .optional()?;
    let mut comment = comment.ok_or_else(|| AppError::not_found("Comment"))?;
    comment.tags = tags(conn, &comment.id)?;
    Ok(comment)
}

/// Remove a comment along with its tags and the tag notifications that
/// point at it.
pub fn uncomment(conn: &Connection, post: &ObjectId, id: &ObjectId) -> AppResult<Post> {
    notifications::delete_for_comment(conn, id)?;
    let removed = conn.execute(
        "DELETE FROM comments WHERE id = ?1 AND post_id = ?2",
        params![id, post],
    )?;
    if removed == 0 {
        return Err(AppError::not_found("Comment"));
    }
    get(conn, post)
}

/// Bump the report counter of a comment.
pub fn report_comment(conn: &Connection, post: &ObjectId, id: &ObjectId) -> AppResult<Comment> {
    let changed = conn.execute(
        "UPDATE comments SET reports = reports + 1 WHERE id = ?1 AND post_id = ?2",
        params![id, post],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("Comment"));
    }
    get_comment(conn, post, id)
}

pub(crate) fn delete_tags_for_user(conn: &Connection, user: &ObjectId) -> AppResult<usize> {
    let removed = conn.execute("DELETE FROM comment_tags WHERE user_id = ?1", [user])?;
    Ok(removed)
}

pub(crate) fn delete_comments_for_user(conn: &Connection, user: &ObjectId) -> AppResult<usize> {
    conn.execute(
        "DELETE FROM notifications
         WHERE comment_id IN (SELECT id FROM comments WHERE user_id = ?1)",
        [user],
    )?;
    let removed = conn.execute("DELETE FROM comments WHERE user_id = ?1", [user])?;
    Ok(removed)
}
