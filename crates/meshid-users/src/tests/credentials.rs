use super::helpers::*;
use crate::*;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_issue_token() {
    let ctx = create_test_context();
    let user = ctx.register("a@example.com", Role::User).await;

    let token = ctx
        .service
        .issue_token("a@example.com", SECRET, Some("domain-1"))
        .await
        .unwrap();

    assert_eq!(token.access_token, format!("access:{}:domain-1", user.id));
    assert_eq!(*ctx.tokens.issued.lock().unwrap(), vec![user.id]);
}

#[tokio::test]
async fn test_unknown_identity_and_wrong_secret_look_alike() {
    let ctx = create_test_context();
    ctx.register("a@example.com", Role::User).await;

    let unknown = ctx
        .service
        .issue_token("nobody@example.com", SECRET, None)
        .await
        .unwrap_err();
    let wrong = ctx
        .service
        .issue_token("a@example.com", "wrongsecret", None)
        .await
        .unwrap_err();

    assert!(matches!(unknown, UsersError::Authentication));
    assert!(matches!(wrong, UsersError::Authentication));
    assert_eq!(unknown.to_string(), wrong.to_string());
    // Both paths ran a comparison
    assert_eq!(ctx.hasher.compares.load(Ordering::SeqCst), 2);
    assert!(ctx.tokens.issued.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_disabled_account_cannot_log_in() {
    let ctx = create_test_context();
    let user = ctx.register("a@example.com", Role::User).await;
    ctx.service
        .disable_client(&admin_session(), &user.id)
        .await
        .unwrap();

    let result = ctx.service.issue_token("a@example.com", SECRET, None).await;

    assert!(matches!(result, Err(UsersError::Authentication)));
}

#[tokio::test]
async fn test_refresh_token() {
    let ctx = create_test_context();
    let user = ctx.register("a@example.com", Role::User).await;

    let token = ctx
        .service
        .refresh_token(&user_session(&user.id), "refresh-1", None)
        .await
        .unwrap();

    assert_eq!(token.refresh_token, "refresh-1");
    assert_eq!(ctx.tokens.refreshed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_disabled_account_cannot_refresh() {
    let ctx = create_test_context();
    let user = ctx.register("a@example.com", Role::User).await;
    ctx.service
        .disable_client(&admin_session(), &user.id)
        .await
        .unwrap();

    let result = ctx
        .service
        .refresh_token(&user_session(&user.id), "refresh-1", None)
        .await;

    assert!(matches!(result, Err(UsersError::Authentication)));
    assert_eq!(ctx.tokens.refreshed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_refresh_for_missing_account_is_authentication_error() {
    let ctx = create_test_context();

    let result = ctx
        .service
        .refresh_token(&user_session("ghost"), "refresh-1", None)
        .await;

    assert!(matches!(result, Err(UsersError::Authentication)));
}

#[tokio::test]
async fn test_update_secret_with_wrong_old_secret_keeps_hash() {
    let ctx = create_test_context();
    let user = ctx.register("a@example.com", Role::User).await;
    let writes = ctx.writes();

    let result = ctx
        .service
        .update_client_secret(&user_session(&user.id), "wrong", "NewStrongSecret1")
        .await;

    assert!(matches!(result, Err(UsersError::Authentication)));
    assert_eq!(ctx.writes(), writes);
    let stored = ctx.clients.retrieve_by_id(&user.id).await.unwrap();
    assert_eq!(stored.credentials.secret, format!("hashed:{}", SECRET));
}

#[tokio::test]
async fn test_update_secret() {
    let ctx = create_test_context();
    let user = ctx.register("a@example.com", Role::User).await;

    let updated = ctx
        .service
        .update_client_secret(&user_session(&user.id), SECRET, "NewStrongSecret1")
        .await
        .unwrap();

    assert!(updated.credentials.secret.is_empty());
    assert_eq!(updated.updated_by.as_deref(), Some(user.id.as_str()));
    ctx.service
        .issue_token("a@example.com", "NewStrongSecret1", None)
        .await
        .unwrap();
    assert!(ctx
        .service
        .issue_token("a@example.com", SECRET, None)
        .await
        .is_err());
}

#[tokio::test]
async fn test_update_secret_checks_password_policy_first() {
    let ctx = create_test_context();
    let user = ctx.register("a@example.com", Role::User).await;

    let result = ctx
        .service
        .update_client_secret(&user_session(&user.id), SECRET, "short")
        .await;

    assert!(matches!(result, Err(UsersError::MalformedEntity(_))));
    assert_eq!(ctx.hasher.compares.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reset_secret_skips_old_secret() {
    let ctx = create_test_context();
    let user = ctx.register("a@example.com", Role::User).await;

    ctx.service
        .reset_secret(&user_session(&user.id), "ResetSecret99")
        .await
        .unwrap();

    assert_eq!(ctx.hasher.compares.load(Ordering::SeqCst), 0);
    let stored = ctx.clients.retrieve_by_id(&user.id).await.unwrap();
    assert_eq!(stored.credentials.secret, "hashed:ResetSecret99");
}

#[tokio::test]
async fn test_generate_reset_token_sends_email() {
    let ctx = create_test_context();
    let user = ctx.register("a@example.com", Role::User).await;

    ctx.service
        .generate_reset_token("a@example.com", "https://mesh.example.com")
        .await
        .unwrap();

    let sent = ctx.emailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["a@example.com".to_string()]);
    assert_eq!(sent[0].host, "https://mesh.example.com");
    assert_eq!(sent[0].user, user.name);
    assert_eq!(sent[0].token, format!("access:{}:-", user.id));
}

#[tokio::test]
async fn test_generate_reset_token_tolerates_email_failure() {
    let ctx = create_test_context();
    ctx.register("a@example.com", Role::User).await;
    ctx.emailer.fail.store(true, Ordering::SeqCst);

    ctx.service
        .generate_reset_token("a@example.com", "https://mesh.example.com")
        .await
        .unwrap();

    assert!(ctx.emailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_generate_reset_token_for_unknown_identity() {
    let ctx = create_test_context();

    let result = ctx
        .service
        .generate_reset_token("nobody@example.com", "https://mesh.example.com")
        .await;

    assert!(matches!(result, Err(UsersError::NotFound)));
}

#[tokio::test]
async fn test_send_password_reset_propagates_errors() {
    let ctx = create_test_context();
    ctx.emailer.fail.store(true, Ordering::SeqCst);

    let result = ctx
        .service
        .send_password_reset("https://mesh.example.com", "a@example.com", "a", "tok")
        .await;

    assert!(matches!(result, Err(UsersError::Email(_))));
}
