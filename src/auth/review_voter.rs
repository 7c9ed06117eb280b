use chrono::{DateTime, Duration, Utc};

use crate::domain::{Review, User};

/// Authors may edit their review for this long after posting it.
pub const EDIT_WINDOW_DAYS: i64 = 7;
/// Authors may delete their review for this long after posting it.
pub const DELETE_WINDOW_DAYS: i64 = 1;

pub fn can_view(review: &Review, viewer: Option<&User>) -> bool {
    if review.is_visible {
        return true;
    }

    match viewer {
        Some(user) => {
            user.id == review.author_id || user.id == review.reviewed_user_id || user.can_moderate()
        }
        None => false,
    }
}

pub fn can_edit(review: &Review, user: &User, now: DateTime<Utc>) -> bool {
    if user.can_moderate() {
        return true;
    }
    user.id == review.author_id && now - review.created_at <= Duration::days(EDIT_WINDOW_DAYS)
}

pub fn can_delete(review: &Review, user: &User, now: DateTime<Utc>) -> bool {
    if user.can_moderate() {
        return true;
    }
    user.id == review.author_id && now - review.created_at <= Duration::days(DELETE_WINDOW_DAYS)
}

pub fn can_moderate(user: &User) -> bool {
    user.can_moderate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CreateReviewRequest, ReviewType, Role};
    use uuid::Uuid;

    fn user(roles: Vec<Role>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "someone@example.com".to_string(),
            first_name: "Sam".to_string(),
            last_name: "Doe".to_string(),
            roles,
            created_at: now,
            updated_at: now,
        }
    }

    fn review(author: &User, reviewed: &User, created_at: DateTime<Utc>) -> Review {
        Review::new(
            author.id,
            reviewed.id,
            Uuid::new_v4(),
            ReviewType::BuyerToSeller,
            CreateReviewRequest {
                overall_rating: 4,
                ..Default::default()
            },
            created_at,
        )
    }

    #[test]
    fn test_hidden_reviews_need_involvement() {
        let author = user(vec![Role::User]);
        let reviewed = user(vec![Role::User]);
        let stranger = user(vec![Role::User]);
        let moderator = user(vec![Role::User, Role::Moderator]);

        let mut r = review(&author, &reviewed, Utc::now());
        assert!(can_view(&r, None));
        assert!(can_view(&r, Some(&stranger)));

        r.is_visible = false;
        assert!(!can_view(&r, None));
        assert!(!can_view(&r, Some(&stranger)));
        assert!(can_view(&r, Some(&author)));
        assert!(can_view(&r, Some(&reviewed)));
        assert!(can_view(&r, Some(&moderator)));
    }

    #[test]
    fn test_author_windows() {
        let now = Utc::now();
        let author = user(vec![Role::User]);
        let reviewed = user(vec![Role::User]);
        let admin = user(vec![Role::Admin]);

        let fresh = review(&author, &reviewed, now - Duration::hours(2));
        assert!(can_edit(&fresh, &author, now));
        assert!(can_delete(&fresh, &author, now));
        assert!(!can_edit(&fresh, &reviewed, now));
        assert!(!can_delete(&fresh, &reviewed, now));

        let older = review(&author, &reviewed, now - Duration::days(3));
        assert!(can_edit(&older, &author, now));
        assert!(!can_delete(&older, &author, now));
        assert!(can_delete(&older, &admin, now));

        let stale = review(&author, &reviewed, now - Duration::days(8));
        assert!(!can_edit(&stale, &author, now));
        assert!(can_edit(&stale, &admin, now));
    }

    #[test]
    fn test_moderation_needs_role() {
        assert!(!can_moderate(&user(vec![Role::User])));
        assert!(can_moderate(&user(vec![Role::Moderator])));
        assert!(can_moderate(&user(vec![Role::Admin])));
    }
}
