use maintarr::config::SecurityConfig;
use maintarr::db::{
    DeviceConflict, DeviceInput, NewPmLog, NewUser, PASSWORD_HISTORY_DEPTH, Store,
};

async fn test_store() -> Store {
    Store::new("sqlite::memory:")
        .await
        .expect("Failed to open in-memory store")
}

/// Small Argon2 parameters so history-window tests stay fast
fn fast_security() -> SecurityConfig {
    SecurityConfig {
        argon2_memory_cost_kib: 1024,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
    }
}

fn new_user(username: &str, password: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        password: password.to_string(),
        last_name: "Doe".to_string(),
        first_name: "Jane".to_string(),
        middle_name: "Q".to_string(),
        position: "Technician".to_string(),
        role: "user".to_string(),
    }
}

fn device_input(name: &str, serial: &str, tag: &str) -> DeviceInput {
    DeviceInput {
        device_name: name.to_string(),
        serial_number: serial.to_string(),
        manufacturer: "Acme Medical".to_string(),
        asset_tag: tag.to_string(),
        date_purchased: "2024-05-01".to_string(),
        responsible_person: "Jane Doe".to_string(),
        location: "Ward 3".to_string(),
    }
}

#[tokio::test]
async fn test_credentials_reject_every_single_character_mutation() {
    let store = test_store().await;
    let security = fast_security();
    let password = "Corr3ct!Horse";

    store
        .create_user(new_user("mutation", password), &security)
        .await
        .unwrap();

    assert!(
        store
            .verify_credentials("mutation", password)
            .await
            .unwrap()
            .is_some()
    );

    for i in 0..password.len() {
        let mut mutated: Vec<char> = password.chars().collect();
        mutated[i] = if mutated[i] == 'x' { 'y' } else { 'x' };
        let mutated: String = mutated.into_iter().collect();

        assert!(
            store
                .verify_credentials("mutation", &mutated)
                .await
                .unwrap()
                .is_none(),
            "mutation at index {i} must not verify"
        );
    }

    // Unknown usernames fail the same way as bad passwords
    assert!(
        store
            .verify_credentials("nobody", password)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_password_history_window_prunes_to_depth() {
    let store = test_store().await;
    let security = fast_security();
    let original = "Origin4l!Pass";

    let user = store
        .create_user(new_user("windowed", original), &security)
        .await
        .unwrap();

    // Creation records the initial hash
    assert_eq!(store.password_history_len(user.id).await.unwrap(), 1);
    assert!(store.is_password_reused(user.id, original).await.unwrap());

    // Rotate enough times to push the original out of the window. The
    // first change appends the original again (it was current), so it
    // takes depth + 1 rotations to purge both copies.
    let rotations = PASSWORD_HISTORY_DEPTH + 1;
    for i in 0..rotations {
        let next = format!("Rotat3d!Pass{i}");
        store
            .change_password(user.id, &next, &security)
            .await
            .unwrap()
            .unwrap();
    }

    assert_eq!(
        store.password_history_len(user.id).await.unwrap(),
        PASSWORD_HISTORY_DEPTH
    );

    // Pruned out of the window
    assert!(!store.is_password_reused(user.id, original).await.unwrap());

    // The oldest retained rotation is still remembered
    assert!(
        store
            .is_password_reused(user.id, "Rotat3d!Pass0")
            .await
            .unwrap()
    );

    // A password never used is not reported as reused
    assert!(
        !store
            .is_password_reused(user.id, "N3ver!Used1")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_change_password_clears_flag_and_reset_rearms_it() {
    let store = test_store().await;
    let security = fast_security();

    let user = store
        .create_user(new_user("flagged", "Cr3ated!Pass"), &security)
        .await
        .unwrap();
    assert!(user.must_change_password);

    let user = store
        .change_password(user.id, "Rot4ted!Pass", &security)
        .await
        .unwrap()
        .unwrap();
    assert!(!user.must_change_password);

    let user = store
        .reset_password(user.id, "F0rced!Reset", &security)
        .await
        .unwrap()
        .unwrap();
    assert!(user.must_change_password);

    // The store verifies only the current password
    assert!(
        store
            .verify_password_for_id(user.id, "F0rced!Reset")
            .await
            .unwrap()
    );
    assert!(
        !store
            .verify_password_for_id(user.id, "Rot4ted!Pass")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_refresh_token_sweep_removes_only_expired_rows() {
    let store = test_store().await;

    let admin = store.get_user_by_username("admin").await.unwrap().unwrap();

    let past = (chrono::Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
    let future = (chrono::Utc::now() + chrono::Duration::days(7)).to_rfc3339();

    store
        .store_refresh_token(admin.id, "stale-token", &past)
        .await
        .unwrap();
    store
        .store_refresh_token(admin.id, "live-token", &future)
        .await
        .unwrap();

    assert_eq!(store.sweep_expired_refresh_tokens().await.unwrap(), 1);
    assert!(store.find_refresh_token("stale-token").await.unwrap().is_none());
    assert!(store.find_refresh_token("live-token").await.unwrap().is_some());
    assert_eq!(store.count_refresh_tokens_for_user(admin.id).await.unwrap(), 1);

    // Deletion is idempotent
    assert!(store.delete_refresh_token("live-token").await.unwrap());
    assert!(!store.delete_refresh_token("live-token").await.unwrap());
}

#[tokio::test]
async fn test_device_conflict_reports_which_column_collided() {
    let store = test_store().await;

    let device = store
        .create_device(device_input("Pump 1", "SN-100", "AT-100"))
        .await
        .unwrap();

    assert_eq!(
        store
            .find_device_conflict("SN-100", "AT-999", None)
            .await
            .unwrap(),
        Some(DeviceConflict::SerialNumber)
    );
    assert_eq!(
        store
            .find_device_conflict("SN-999", "AT-100", None)
            .await
            .unwrap(),
        Some(DeviceConflict::AssetTag)
    );
    assert_eq!(
        store
            .find_device_conflict("SN-999", "AT-999", None)
            .await
            .unwrap(),
        None
    );

    // A device never collides with itself during update
    assert_eq!(
        store
            .find_device_conflict("SN-100", "AT-100", Some(device.id))
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_deleting_a_device_cascades_to_dependents() {
    let store = test_store().await;

    let device = store
        .create_device(device_input("Pump 2", "SN-200", "AT-200"))
        .await
        .unwrap();

    let (checklist, checklist_tasks) = store
        .create_checklist_with_tasks(
            &device,
            &["Hardware Maintenance".to_string()],
            "Monthly",
            &["Check fans".to_string(), "Inspect cabling".to_string()],
        )
        .await
        .unwrap();

    let (log, log_tasks) = store
        .create_pm_log_with_tasks(
            &device,
            NewPmLog {
                date: "2026-04-01".to_string(),
                fully_functional: "yes".to_string(),
                recommendation: None,
                performed_by: "Ana Cruz".to_string(),
                validated_by: None,
                acknowledged_by: None,
                findings_solutions: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(log_tasks.len(), 2, "log snapshots the checklist tasks");

    let expires = (chrono::Utc::now() + chrono::Duration::hours(24)).to_rfc3339();
    let admin = store.get_user_by_username("admin").await.unwrap().unwrap();
    store
        .create_qr_token("cascade-qr-token", device.id, admin.id, &expires)
        .await
        .unwrap();

    assert!(store.delete_device(device.id).await.unwrap());

    assert!(store.get_checklist(checklist.id).await.unwrap().is_none());
    assert!(
        store
            .get_checklist_task(checklist_tasks[0].id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(store.get_pm_log(log.id).await.unwrap().is_none());
    assert!(
        store
            .get_pm_log_task(log_tasks[0].id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        store
            .find_qr_token("cascade-qr-token")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_deleting_a_user_cascades_to_their_tokens_and_history() {
    let store = test_store().await;
    let security = fast_security();

    let user = store
        .create_user(new_user("leaver", "Dep4rting!Pass"), &security)
        .await
        .unwrap();

    let future = (chrono::Utc::now() + chrono::Duration::days(7)).to_rfc3339();
    store
        .store_refresh_token(user.id, "leaver-refresh", &future)
        .await
        .unwrap();

    let device = store
        .create_device(device_input("Pump 3", "SN-300", "AT-300"))
        .await
        .unwrap();
    store
        .create_qr_token("leaver-qr", device.id, user.id, &future)
        .await
        .unwrap();

    assert!(store.delete_user(user.id).await.unwrap());

    assert!(store.find_refresh_token("leaver-refresh").await.unwrap().is_none());
    assert!(store.find_qr_token("leaver-qr").await.unwrap().is_none());
    assert_eq!(store.password_history_len(user.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_user_listing_filters_and_pages() {
    let store = test_store().await;
    let security = fast_security();

    for i in 0..3 {
        store
            .create_user(new_user(&format!("tech{i}"), "Sh4red!Pass"), &security)
            .await
            .unwrap();
    }

    // Bootstrap admin plus the three above
    let (_, total) = store.list_users(1, 10, None, None).await.unwrap();
    assert_eq!(total, 4);

    let (page, total) = store.list_users(2, 2, None, None).await.unwrap();
    assert_eq!(total, 4);
    assert_eq!(page.len(), 2);

    let (admins, total) = store.list_users(1, 10, None, Some("admin")).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(admins[0].username, "admin");

    let (hits, total) = store.list_users(1, 10, Some("tech1"), None).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(hits[0].username, "tech1");

    let stats = store.user_stats().await.unwrap();
    assert_eq!(stats.total_users, 4);
    assert_eq!(stats.admin_count, 1);
    assert_eq!(stats.user_count, 3);
}
