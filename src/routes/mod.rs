pub mod accounts;
pub mod attachments;
pub mod forms;
pub mod health;
pub mod media;
pub mod subtasks;
pub mod tasks;

use actix_web::web;

/// Routes of the `/api` scope.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(accounts::signup)
        .service(accounts::token)
        .service(accounts::profile)
        .service(accounts::update_profile)
        .service(accounts::change_password)
        .service(accounts::delete_account)
        .service(
            web::scope("/tasks")
                .service(tasks::list_tasks)
                .service(tasks::create_task)
                .service(tasks::get_task)
                .service(tasks::replace_task)
                .service(tasks::patch_task)
                .service(tasks::delete_task)
                .service(tasks::list_attachments)
                .service(tasks::upload_attachment),
        )
        .service(
            web::scope("/subtasks")
                .service(subtasks::list_subtasks)
                .service(subtasks::create_subtask)
                .service(subtasks::get_subtask)
                .service(subtasks::replace_subtask)
                .service(subtasks::patch_subtask)
                .service(subtasks::delete_subtask),
        )
        .service(
            web::scope("/attachments")
                .service(attachments::get_attachment)
                .service(attachments::attachment_content)
                .service(attachments::delete_attachment),
        );
}
