use crate::{auth, auth::AuthUser, db::Db, errors::ApiError};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::Row;

#[derive(Deserialize)]
pub struct UpdateProfileReq {
    pub name: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub about: Option<String>,
    pub phone_number: Option<String>,
    pub whatsapp_number: Option<String>,
    pub batch_number: Option<i64>,
    pub skills: Option<String>,
    pub linkedin_url: Option<String>,
    pub website_url: Option<String>,
}

/// Partial update; absent fields keep their current value.
pub async fn update_profile(
    db: web::Data<Db>,
    user: AuthUser,
    body: web::Json<UpdateProfileReq>,
) -> Result<HttpResponse, ApiError> {
    if body.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::BadRequest("name must not be empty".into()));
    }

    sqlx::query(
        "UPDATE users SET
            name = COALESCE(?, name),
            headline = COALESCE(?, headline),
            location = COALESCE(?, location),
            about = COALESCE(?, about),
            phone_number = COALESCE(?, phone_number),
            whatsapp_number = COALESCE(?, whatsapp_number),
            batch_number = COALESCE(?, batch_number),
            skills = COALESCE(?, skills),
            linkedin_url = COALESCE(?, linkedin_url),
            website_url = COALESCE(?, website_url)
         WHERE id = ?",
    )
    .bind(&body.name)
    .bind(&body.headline)
    .bind(&body.location)
    .bind(&body.about)
    .bind(&body.phone_number)
    .bind(&body.whatsapp_number)
    .bind(body.batch_number)
    .bind(&body.skills)
    .bind(&body.linkedin_url)
    .bind(&body.website_url)
    .bind(&user.user_id)
    .execute(&db.0)
    .await?;

    let updated = super::auth::load_user(&db, &user.user_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "user": updated })))
}

#[derive(Deserialize)]
pub struct ChangePasswordReq {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    db: web::Data<Db>,
    user: AuthUser,
    body: web::Json<ChangePasswordReq>,
) -> Result<HttpResponse, ApiError> {
    if body.new_password.len() < 8 {
        return Err(ApiError::BadRequest("new password too short".into()));
    }
    let row = sqlx::query("SELECT password_hash FROM users WHERE id = ?")
        .bind(&user.user_id)
        .fetch_one(&db.0)
        .await?;
    let hash: String = row.get("password_hash");
    if !auth::verify_password(&hash, &body.current_password) {
        return Err(ApiError::Forbidden);
    }
    let new_hash = auth::hash_password(&body.new_password)?;
    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(new_hash)
        .bind(&user.user_id)
        .execute(&db.0)
        .await?;
    Ok(HttpResponse::Ok().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::seed_user;
    use actix_web::ResponseError as _;
    use actix_web::body::to_bytes;
    use actix_web::http::StatusCode;

    fn empty_update() -> UpdateProfileReq {
        UpdateProfileReq {
            name: None,
            headline: None,
            location: None,
            about: None,
            phone_number: None,
            whatsapp_number: None,
            batch_number: None,
            skills: None,
            linkedin_url: None,
            website_url: None,
        }
    }

    #[actix_web::test]
    async fn update_is_partial_and_keeps_missing_fields() {
        let db = web::Data::new(Db::connect_memory().await.unwrap());
        let ada = seed_user(&db, "Ada", "ada@example.org", false).await;

        let resp = update_profile(
            db.clone(),
            AuthUser { user_id: ada.clone() },
            web::Json(UpdateProfileReq {
                headline: Some("Pharmacist in training".into()),
                ..empty_update()
            }),
        )
        .await
        .unwrap();
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["user"]["name"], "Ada");
        assert_eq!(json["user"]["headline"], "Pharmacist in training");

        // a later partial update must not wipe the headline
        let resp = update_profile(
            db,
            AuthUser { user_id: ada },
            web::Json(UpdateProfileReq {
                location: Some("Lagos".into()),
                ..empty_update()
            }),
        )
        .await
        .unwrap();
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["user"]["headline"], "Pharmacist in training");
        assert_eq!(json["user"]["location"], "Lagos");
    }

    #[actix_web::test]
    async fn password_change_requires_the_current_password() {
        let db = web::Data::new(Db::connect_memory().await.unwrap());
        let ada = seed_user(&db, "Ada", "ada@example.org", false).await;
        let hash = auth::hash_password("old password").unwrap();
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(&hash)
            .bind(&ada)
            .execute(&db.0)
            .await
            .unwrap();

        let err = change_password(
            db.clone(),
            AuthUser { user_id: ada.clone() },
            web::Json(ChangePasswordReq {
                current_password: "not it".into(),
                new_password: "fresh password".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        change_password(
            db.clone(),
            AuthUser { user_id: ada.clone() },
            web::Json(ChangePasswordReq {
                current_password: "old password".into(),
                new_password: "fresh password".into(),
            }),
        )
        .await
        .unwrap();

        let row = sqlx::query("SELECT password_hash FROM users WHERE id = ?")
            .bind(&ada)
            .fetch_one(&db.0)
            .await
            .unwrap();
        assert!(auth::verify_password(
            &row.get::<String, _>("password_hash"),
            "fresh password"
        ));
    }
}
