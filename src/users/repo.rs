use sqlx::Connection;
use time::OffsetDateTime;

use crate::db::{with_connection, Session};
use crate::users::repo_types::{NewUser, User};

impl User {
    /// Find a user by exact username.
    pub async fn find_by_username(
        session: &mut Session,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        with_connection!(session, |conn| {
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, username, password, created_at
                FROM users
                WHERE username = $1
                "#,
            )
            .bind(username)
            .fetch_optional(&mut **conn)
            .await
        })
    }

    /// Insert a user and commit. A concurrent insert of the same username
    /// surfaces as the database's unique-violation error.
    pub async fn create(session: &mut Session, new_user: &NewUser) -> Result<User, sqlx::Error> {
        let created_at = OffsetDateTime::now_utc();
        with_connection!(session, |conn| {
            let mut tx = Connection::begin(&mut **conn).await?;
            let user = sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (username, password, created_at)
                VALUES ($1, $2, $3)
                RETURNING id, username, password, created_at
                "#,
            )
            .bind(&new_user.username)
            .bind(&new_user.password)
            .bind(created_at)
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(user)
        })
    }

    /// All users, oldest id first.
    pub async fn list(session: &mut Session) -> Result<Vec<User>, sqlx::Error> {
        with_connection!(session, |conn| {
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, username, password, created_at
                FROM users
                ORDER BY id ASC
                "#,
            )
            .fetch_all(&mut **conn)
            .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::sqlite_pool;
    use crate::error::is_unique_violation;

    fn new_user(username: &str, password: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn find_returns_none_for_unknown_username() {
        let (_dir, pool) = sqlite_pool(1).await;
        let mut session = pool.session().await.unwrap();
        let found = User::find_by_username(&mut session, "nobody").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn create_assigns_id_and_timestamp() {
        let (_dir, pool) = sqlite_pool(1).await;
        let mut session = pool.session().await.unwrap();
        let before = OffsetDateTime::now_utc();

        let user = User::create(&mut session, &new_user("alice", "secret123"))
            .await
            .unwrap();

        assert!(user.id > 0);
        assert_eq!(user.username, "alice");
        assert_eq!(user.password, "secret123");
        assert!(user.created_at >= before - time::Duration::seconds(1));

        let found = User::find_by_username(&mut session, "alice")
            .await
            .unwrap()
            .expect("user should be persisted");
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn create_is_visible_from_another_session() {
        let (_dir, pool) = sqlite_pool(2).await;
        let mut writer = pool.session().await.unwrap();
        User::create(&mut writer, &new_user("erin", "pass1234"))
            .await
            .unwrap();

        let mut reader = pool.session().await.unwrap();
        let users = User::list(&mut reader).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "erin");
    }

    #[tokio::test]
    async fn find_is_exact_match() {
        let (_dir, pool) = sqlite_pool(1).await;
        let mut session = pool.session().await.unwrap();
        User::create(&mut session, &new_user("Frank", "pass1234"))
            .await
            .unwrap();

        assert!(User::find_by_username(&mut session, "frank")
            .await
            .unwrap()
            .is_none());
        assert!(User::find_by_username(&mut session, "Fran")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn list_orders_by_id() {
        let (_dir, pool) = sqlite_pool(1).await;
        let mut session = pool.session().await.unwrap();
        for name in ["charlie", "diana", "bob"] {
            User::create(&mut session, &new_user(name, "pass1234"))
                .await
                .unwrap();
        }

        let users = User::list(&mut session).await.unwrap();
        let names: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, ["charlie", "diana", "bob"]);
        assert!(users.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn duplicate_insert_hits_unique_constraint() {
        let (_dir, pool) = sqlite_pool(1).await;
        let mut session = pool.session().await.unwrap();
        User::create(&mut session, &new_user("bob", "strongpass"))
            .await
            .unwrap();

        let err = User::create(&mut session, &new_user("bob", "otherpass"))
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err), "unexpected error: {err}");

        let users = User::list(&mut session).await.unwrap();
        assert_eq!(users.len(), 1);
    }
}
