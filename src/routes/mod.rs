pub mod admin;
pub mod auth;
pub mod events;
pub mod files;
pub mod health;
pub mod messages;
pub mod pages;
pub mod posts;
pub mod profile;

use actix_web::web;

use crate::ws;

pub fn configure(app: &mut web::ServiceConfig) {
    app.service(
        web::scope("/api")
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(auth::register))
                    .route("/login", web::post().to(auth::login))
                    .route("/logout", web::post().to(auth::logout))
                    .route("/me", web::get().to(auth::me)),
            )
            .service(
                web::scope("/forum/posts")
                    .route("", web::get().to(posts::list_posts))
                    .route("", web::post().to(posts::create_post))
                    .route("/{id}", web::get().to(posts::get_post))
                    .route("/{id}/comments", web::post().to(posts::add_comment))
                    .route("/{id}/like", web::post().to(posts::toggle_like)),
            )
            .route("/events", web::get().to(events::list_events))
            .route("/next-event", web::get().to(events::next_event))
            .service(
                web::scope("/messages")
                    .route("/conversations", web::get().to(messages::list_conversations))
                    .route("/conversation/{user_id}", web::get().to(messages::get_conversation))
                    .route("/send/{user_id}", web::post().to(messages::send_message)),
            )
            .route("/unread-count", web::get().to(messages::unread_count))
            .route("/pages/home", web::get().to(pages::home_data))
            .service(
                web::scope("/profile")
                    .route("/update", web::put().to(profile::update_profile))
                    .route("/password", web::put().to(profile::change_password)),
            )
            .service(
                web::scope("/admin")
                    .route("/stats", web::get().to(admin::stats))
                    .route("/posts", web::get().to(admin::list_posts))
                    .route("/posts/{id}", web::patch().to(admin::update_post))
                    .route("/posts/{id}", web::delete().to(admin::delete_post))
                    .route("/comments", web::get().to(admin::list_comments))
                    .route("/comments/{id}", web::patch().to(admin::update_comment))
                    .route("/comments/{id}", web::delete().to(admin::delete_comment))
                    .route("/events", web::get().to(admin::list_events))
                    .route("/events", web::post().to(admin::create_event))
                    .route("/events/calendar", web::get().to(admin::events_calendar))
                    .route("/events/{id}", web::patch().to(admin::update_event))
                    .route("/events/{id}", web::delete().to(admin::delete_event))
                    .route("/events/{id}/image", web::put().to(admin::upload_event_image)),
            )
            .route("/health", web::get().to(health::health_check)),
    )
    // legacy paths the existing web client still calls
    .route("/forum/", web::get().to(posts::list_posts))
    .route("/forum/post/{id}/like", web::post().to(posts::toggle_like))
    .route(
        "/forum/messages/delete/{id}",
        web::delete().to(messages::delete_message),
    )
    .route(
        "/forum/messages/delete_conversation/{user_id}",
        web::delete().to(messages::delete_conversation),
    )
    .route("/ws", web::get().to(ws::session::ws_route))
    .route("/files/{filename:.*}", web::get().to(files::get_file));
}
