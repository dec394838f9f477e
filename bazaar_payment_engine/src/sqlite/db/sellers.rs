use sqlx::SqliteConnection;

use crate::{
    db_types::{OnboardingStatus, SellerProfile},
    traits::PaymentGatewayError,
};

pub async fn create_profile(
    seller_id: &str,
    stripe_account_id: &str,
    conn: &mut SqliteConnection,
) -> Result<SellerProfile, PaymentGatewayError> {
    let profile = sqlx::query_as(
        r#"
        INSERT INTO seller_profiles (seller_id, stripe_account_id)
        VALUES ($1, $2)
        ON CONFLICT (seller_id) DO UPDATE SET stripe_account_id = excluded.stripe_account_id,
            updated_at = CURRENT_TIMESTAMP
        RETURNING *
        "#,
    )
    .bind(seller_id)
    .bind(stripe_account_id)
    .fetch_one(conn)
    .await?;
    Ok(profile)
}

pub async fn fetch_profile(
    seller_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<SellerProfile>, sqlx::Error> {
    let profile = sqlx::query_as("SELECT * FROM seller_profiles WHERE seller_id = $1")
        .bind(seller_id)
        .fetch_optional(conn)
        .await?;
    Ok(profile)
}

pub async fn update_onboarding(
    stripe_account_id: &str,
    status: OnboardingStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<SellerProfile>, PaymentGatewayError> {
    let profile: Option<SellerProfile> = sqlx::query_as(
        r#"
        UPDATE seller_profiles SET onboarding_status = $1, updated_at = CURRENT_TIMESTAMP
        WHERE stripe_account_id = $2
        RETURNING *
        "#,
    )
    .bind(status.to_string())
    .bind(stripe_account_id)
    .fetch_optional(conn)
    .await?;
    Ok(profile)
}
