use crate::{auth, config::Config, db::Db, errors::ApiError, models::user::User};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::Row;

#[derive(Deserialize)]
pub struct RegisterReq {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
    pub whatsapp_number: String,
    pub batch_number: Option<i64>,
    pub is_member: Option<bool>,
}

fn auth_response(token: String, user: &User) -> serde_json::Value {
    serde_json::json!({
        "token": token,
        "user": {
            "id": user.id,
            "name": user.name,
            "email": user.email,
            "is_admin": user.is_admin,
        }
    })
}

pub async fn register(
    cfg: web::Data<Config>,
    db: web::Data<Db>,
    body: web::Json<RegisterReq>,
) -> Result<HttpResponse, ApiError> {
    let email = body.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest("valid email required".into()));
    }
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name required".into()));
    }
    if body.password.len() < 8 {
        return Err(ApiError::BadRequest("password too short".into()));
    }

    let hash = auth::hash_password(&body.password)?;
    let user_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now();
    let is_member = body.is_member.unwrap_or(false);
    // Members register as undergraduates, everyone else as students.
    let status = if is_member { "undergraduate" } else { "student" };

    let res = sqlx::query(
        "INSERT INTO users(id, name, email, password_hash, phone_number, whatsapp_number, batch_number, status, is_member, is_admin, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)",
    )
    .bind(&user_id)
    .bind(body.name.trim())
    .bind(&email)
    .bind(&hash)
    .bind(&body.phone_number)
    .bind(&body.whatsapp_number)
    .bind(body.batch_number)
    .bind(status)
    .bind(is_member)
    .bind(now)
    .execute(&db.0)
    .await;

    if let Err(e) = res {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.message().contains("UNIQUE") {
                return Err(ApiError::Conflict("email already registered".into()));
            }
        }
        return Err(e.into());
    }

    let user = load_user(&db, &user_id).await?;
    let token = auth::create_access_token(&user_id, &cfg)?;
    Ok(HttpResponse::Created().json(auth_response(token, &user)))
}

#[derive(Deserialize)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

pub async fn login(
    cfg: web::Data<Config>,
    db: web::Data<Db>,
    body: web::Json<LoginReq>,
) -> Result<HttpResponse, ApiError> {
    let email = body.email.trim().to_lowercase();
    let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&db.0)
        .await?;

    let row = row.ok_or(ApiError::Unauthorized)?;
    let user_id: String = row.get("id");
    let password_hash: String = row.get("password_hash");

    if !auth::verify_password(&password_hash, &body.password) {
        return Err(ApiError::Unauthorized);
    }

    let user = load_user(&db, &user_id).await?;
    let token = auth::create_access_token(&user_id, &cfg)?;
    Ok(HttpResponse::Ok().json(auth_response(token, &user)))
}

// JWTs are stateless; logout is the client discarding its token.
pub async fn logout(_user: auth::AuthUser) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(serde_json::json!({"message": "logged out"})))
}

pub async fn me(db: web::Data<Db>, user: auth::AuthUser) -> Result<HttpResponse, ApiError> {
    let me = load_user(&db, &user.user_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "user": me })))
}

pub(crate) async fn load_user(db: &Db, user_id: &str) -> Result<User, ApiError> {
    let row = sqlx::query(
        "SELECT id, name, email, phone_number, whatsapp_number, batch_number, status, is_member,
                headline, location, about, skills, linkedin_url, website_url, is_admin, created_at
         FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(&db.0)
    .await?;
    let row = row.ok_or(ApiError::NotFound)?;
    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone_number: row.get("phone_number"),
        whatsapp_number: row.get("whatsapp_number"),
        batch_number: row.get("batch_number"),
        status: row.get("status"),
        is_member: row.get("is_member"),
        headline: row.get("headline"),
        location: row.get("location"),
        about: row.get("about"),
        skills: row.get("skills"),
        linkedin_url: row.get("linkedin_url"),
        website_url: row.get("website_url"),
        is_admin: row.get("is_admin"),
        created_at: row.get("created_at"),
    })
}
