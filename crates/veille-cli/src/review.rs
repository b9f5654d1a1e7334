//! Operator review commands: workflow transitions and theme reassignment.

use clap::{Args, ValueEnum};
use veille_core::{Action, Actor, AppConfig, Article, ContentEdit};
use veille_db::PgStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransitionAction {
    Validate,
    Reject,
    Certify,
    Reopen,
}

/// Who is acting. Exactly one of `--admin` or `--member` is required; a
/// member also names their assigned theme.
#[derive(Debug, Args)]
pub struct ActorArgs {
    /// Act as an administrator with this name
    #[arg(long, conflicts_with = "member", required_unless_present = "member")]
    pub admin: Option<String>,

    /// Act as a theme member with this name
    #[arg(long, requires = "member_theme")]
    pub member: Option<String>,

    /// The member's assigned theme
    #[arg(long, requires = "member")]
    pub member_theme: Option<String>,
}

impl ActorArgs {
    pub(crate) fn to_actor(&self) -> anyhow::Result<Actor> {
        match (&self.admin, &self.member, &self.member_theme) {
            (Some(name), None, None) => Ok(Actor::Admin { name: name.clone() }),
            (None, Some(name), Some(theme)) => Ok(Actor::Member {
                name: name.clone(),
                theme: theme.clone(),
            }),
            _ => anyhow::bail!("pass either --admin NAME or --member NAME --member-theme THEME"),
        }
    }
}

/// Turn command-line flags into a workflow action. A missing rejection
/// reason is passed through empty so the workflow refuses it.
pub(crate) fn build_action(
    action: TransitionAction,
    reason: Option<String>,
    edit: ContentEdit,
) -> anyhow::Result<Action> {
    if action != TransitionAction::Validate && !edit.is_empty() {
        anyhow::bail!("--title, --content and --sentiment are only accepted with validate");
    }
    if action != TransitionAction::Reject && reason.is_some() {
        anyhow::bail!("--reason is only accepted with reject");
    }

    Ok(match action {
        TransitionAction::Validate => Action::Validate {
            edits: (!edit.is_empty()).then_some(edit),
        },
        TransitionAction::Reject => Action::Reject {
            reason: reason.unwrap_or_default(),
        },
        TransitionAction::Certify => Action::Certify,
        TransitionAction::Reopen => Action::Reopen,
    })
}

fn print_article_line(article: &Article) {
    println!(
        "article {} [{}] theme={} status={}",
        article.id,
        article.fingerprint,
        article.theme.as_deref().unwrap_or("unassigned"),
        article.status
    );
}

/// # Errors
///
/// Returns the workflow's refusal (`InvalidTransition`, `ReasonRequired`,
/// `NotFound`) or a storage error.
pub(crate) async fn run_transition(
    pool: &sqlx::PgPool,
    id: i64,
    action: &Action,
    actor: &Actor,
) -> anyhow::Result<()> {
    let store = PgStore::new(pool.clone());
    let article = veille_core::apply_transition(&store, id, action, actor).await?;
    print_article_line(&article);
    Ok(())
}

/// Reassign against the registry file as it is now.
///
/// # Errors
///
/// Returns an error if the registry cannot be loaded, the theme is unknown,
/// or the workflow refuses the move.
pub(crate) async fn run_reassign(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    id: i64,
    theme: &str,
    actor: &Actor,
) -> anyhow::Result<()> {
    let themes = veille_core::load_themes(&config.themes_path)?;
    let store = PgStore::new(pool.clone());
    let article = veille_core::reassign_theme(&store, &themes, id, theme, actor).await?;
    print_article_line(&article);
    Ok(())
}
