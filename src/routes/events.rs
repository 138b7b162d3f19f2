use crate::{db::Db, errors::ApiError, models::event::Event};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate, NaiveTime};
use sqlx::Row;

pub(crate) fn event_from_row(row: &sqlx::sqlite::SqliteRow) -> Event {
    Event {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        event_date: row.get("event_date"),
        event_time: row.get("event_time"),
        image_url: row.get("image_url"),
        presenter: row.get("presenter"),
        event_url: row.get("event_url"),
        is_archived: row.get("is_archived"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
    }
}

const EVENT_COLUMNS: &str = "id, title, description, event_date, event_time, image_url, presenter, event_url, is_archived, created_by, created_at";

/// Events whose start already passed get archived as a side effect of
/// listing, then the remainder is split into live (today, time still
/// ahead) and upcoming (future dates).
pub async fn list_events(db: web::Data<Db>) -> Result<HttpResponse, ApiError> {
    let now = Local::now();
    let today = now.date_naive();
    let time_now = now.time();

    archive_past_events(&db, today, time_now).await?;

    let live_sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events
         WHERE is_archived = 0 AND event_date = ? AND event_time IS NOT NULL AND event_time > ?
         ORDER BY event_time ASC"
    );
    let live_rows = sqlx::query(&live_sql)
        .bind(today)
        .bind(time_now)
        .fetch_all(&db.0)
        .await?;

    let upcoming_sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events
         WHERE is_archived = 0 AND event_date > ?
         ORDER BY event_date ASC, event_time ASC"
    );
    let upcoming_rows = sqlx::query(&upcoming_sql).bind(today).fetch_all(&db.0).await?;

    let archived_sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE is_archived = 1
         ORDER BY event_date DESC, event_time DESC"
    );
    let archived_rows = sqlx::query(&archived_sql).fetch_all(&db.0).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "live_events": live_rows.iter().map(event_from_row).collect::<Vec<_>>(),
        "upcoming_events": upcoming_rows.iter().map(event_from_row).collect::<Vec<_>>(),
        "archived_events": archived_rows.iter().map(event_from_row).collect::<Vec<_>>(),
    })))
}

pub(crate) async fn archive_past_events(
    db: &Db,
    today: NaiveDate,
    time_now: NaiveTime,
) -> Result<u64, ApiError> {
    let res = sqlx::query(
        "UPDATE events SET is_archived = 1
         WHERE is_archived = 0
           AND (event_date < ? OR (event_date = ? AND event_time IS NOT NULL AND event_time <= ?))",
    )
    .bind(today)
    .bind(today)
    .bind(time_now)
    .execute(&db.0)
    .await?;
    Ok(res.rows_affected())
}

/// Payload for the home-page countdown widget, which polls this endpoint.
pub async fn next_event(db: web::Data<Db>) -> Result<HttpResponse, ApiError> {
    let now = Local::now();
    let today = now.date_naive();
    let time_now = now.time();

    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events
         WHERE event_date > ? OR (event_date = ? AND event_time IS NOT NULL AND event_time > ?)
         ORDER BY event_date ASC, event_time ASC LIMIT 1"
    );
    let row = sqlx::query(&sql)
        .bind(today)
        .bind(today)
        .bind(time_now)
        .fetch_optional(&db.0)
        .await?;

    let Some(row) = row else {
        return Ok(HttpResponse::Ok().json(serde_json::json!({ "no_event": true })));
    };
    let event = event_from_row(&row);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "title": event.title,
        "description": event.description,
        "event_datetime": event.start_datetime().format("%Y-%m-%dT%H:%M:%S").to_string(),
        "has_time": event.event_time.is_some(),
        "image_url": event.image_url,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{seed_event, seed_user};
    use actix_web::body::to_bytes;
    use chrono::Duration;

    async fn body_json(resp: HttpResponse) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[actix_web::test]
    async fn next_event_picks_the_earliest_future_event() {
        let db = web::Data::new(Db::connect_memory().await.unwrap());
        let admin = seed_user(&db, "Admin", "admin@example.org", true).await;
        let today = Local::now().date_naive();

        seed_event(&db, &admin, "Later", today + Duration::days(30), None, false).await;
        seed_event(&db, &admin, "Sooner", today + Duration::days(2), None, false).await;
        seed_event(&db, &admin, "Past", today - Duration::days(2), None, false).await;

        let next = body_json(next_event(db).await.unwrap()).await;
        assert_eq!(next["title"], "Sooner");
        assert_eq!(next["has_time"], false);
        // no time set: the countdown targets midnight of the event date
        let expected = (today + Duration::days(2))
            .and_time(NaiveTime::MIN)
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string();
        assert_eq!(next["event_datetime"], expected);
    }

    #[actix_web::test]
    async fn next_event_reports_no_event_when_everything_passed() {
        let db = web::Data::new(Db::connect_memory().await.unwrap());
        let admin = seed_user(&db, "Admin", "admin@example.org", true).await;
        let today = Local::now().date_naive();
        seed_event(&db, &admin, "Past", today - Duration::days(1), None, false).await;

        let next = body_json(next_event(db).await.unwrap()).await;
        assert_eq!(next["no_event"], true);
    }

    #[actix_web::test]
    async fn listing_archives_past_events_and_buckets_the_rest() {
        let db = web::Data::new(Db::connect_memory().await.unwrap());
        let admin = seed_user(&db, "Admin", "admin@example.org", true).await;
        let today = Local::now().date_naive();

        seed_event(&db, &admin, "Old", today - Duration::days(3), None, false).await;
        seed_event(&db, &admin, "Future", today + Duration::days(3), None, false).await;
        seed_event(&db, &admin, "Archived", today - Duration::days(10), None, true).await;

        let listing = body_json(list_events(db.clone()).await.unwrap()).await;
        assert_eq!(listing["upcoming_events"].as_array().unwrap().len(), 1);
        assert_eq!(listing["upcoming_events"][0]["title"], "Future");
        // "Old" was auto-archived by the listing pass
        let archived: Vec<_> = listing["archived_events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["title"].as_str().unwrap().to_string())
            .collect();
        assert!(archived.contains(&"Old".to_string()));
        assert!(archived.contains(&"Archived".to_string()));

        // a dated-today event with no time set is neither live nor archived
        seed_event(&db, &admin, "Today allday", today, None, false).await;
        let listing = body_json(list_events(db).await.unwrap()).await;
        assert!(listing["live_events"].as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn archive_pass_is_driven_by_date_and_time() {
        let db = web::Data::new(Db::connect_memory().await.unwrap());
        let admin = seed_user(&db, "Admin", "admin@example.org", true).await;
        let day = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        let morning = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let evening = NaiveTime::from_hms_opt(20, 0, 0).unwrap();
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();

        seed_event(&db, &admin, "Done", day, Some(morning), false).await;
        seed_event(&db, &admin, "Tonight", day, Some(evening), false).await;
        seed_event(&db, &admin, "Allday", day, None, false).await;

        let archived = archive_past_events(&db, day, noon).await.unwrap();
        assert_eq!(archived, 1);

        let row = sqlx::query("SELECT is_archived FROM events WHERE title = 'Done'")
            .fetch_one(&db.0)
            .await
            .unwrap();
        assert!(row.get::<bool, _>("is_archived"));
        let row = sqlx::query("SELECT is_archived FROM events WHERE title = 'Tonight'")
            .fetch_one(&db.0)
            .await
            .unwrap();
        assert!(!row.get::<bool, _>("is_archived"));
    }
}
