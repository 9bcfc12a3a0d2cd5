/// Data models for Roster
///
/// # Models
///
/// - `user`: the single User resource, its create/update payloads and the
///   field validation applied before anything reaches the store
///
/// # Example
///
/// ```
/// use roster_shared::models::user::{validate_new, NewUser};
///
/// let candidate = NewUser {
///     name: Some("  Ada Lovelace ".to_string()),
///     email: Some("ADA@Example.com".to_string()),
///     ..Default::default()
/// };
///
/// let user = validate_new(candidate).unwrap();
/// assert_eq!(user.email, "ada@example.com");
/// assert_eq!(user.city, "Portmore");
/// ```

pub mod user;
