//! `cof courses` – enrolled courses, marking the configured ones.

use anyhow::Result;
use cof_core::auth::CredentialProvider;
use cof_core::config::AgentConfig;

use super::build_agent;

pub async fn run_courses(cfg: &AgentConfig) -> Result<()> {
    let agent = build_agent(cfg)?;
    let token = agent.credentials().token().await?;
    let enrolled = agent.enrolled_courses(&token).await?;
    if enrolled.is_empty() {
        println!("No enrolled courses.");
        return Ok(());
    }
    println!("{:<6} {:<8} {:<10} {}", "ID", "LESSONS", "ARCHIVED", "TITLE");
    for course in enrolled {
        let configured = cfg.courses.iter().any(|c| c.id == course.id);
        let archived = if configured || cfg.include_enrolled { "yes" } else { "no" };
        let lessons = course
            .count_lessons
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<6} {:<8} {:<10} {}", course.id, lessons, archived, course.title);
    }
    Ok(())
}
