//! One-shot commands: everything except the settings session.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Result, bail};
use trellis_lsp::{LspClient, SettingsView, resolve_project};
use trellis_types::{BuildResult, Project, RunResult, render_build_line};

use crate::args::SettingsScope;

pub async fn projects(client: &LspClient) -> Result<()> {
    let projects = client.projects().await?;
    print!("{}", format_projects(&projects));
    Ok(())
}

fn format_projects(projects: &[Project]) -> String {
    let width = projects.iter().map(|p| p.name.len()).max().unwrap_or(0);
    projects.iter().fold(String::new(), |mut out, project| {
        let _ = writeln!(out, "{:width$}  {}", project.name, project.directory);
        out
    })
}

/// Build and stream the server's output. Returns the process exit code.
pub async fn build(client: &LspClient, clean: bool, color: bool) -> Result<i32> {
    tracing::info!(clean, "Building workspace");
    let result = client.build(clean).await?;
    print!("{}", format_build(&result, color));
    let code = match (&result.error, result.exit_code) {
        (Some(_), None) => 1,
        _ => result.exit_code_or_success(),
    };
    tracing::info!(code, "Build finished");
    Ok(code)
}

/// Output lines, then the server's error message if it sent one.
fn format_build(result: &BuildResult, color: bool) -> String {
    let mut out: String = result
        .lines()
        .iter()
        .map(|line| render_build_line(line, color))
        .collect();
    if let Some(error) = &result.error {
        out.push_str(&render_build_line(&format!("ERROR: {error}"), color));
    }
    if color && !out.is_empty() {
        out.push_str("\x1b[0m");
    }
    out
}

pub async fn run(client: &LspClient, project: &str) -> Result<()> {
    let launch = client.run(project).await?;
    print!("{}", format_launch(&launch));
    Ok(())
}

fn format_launch(launch: &RunResult) -> String {
    let mut out = format!("target:      {}\n", launch.target);
    if !launch.arguments.is_empty() {
        let _ = writeln!(out, "arguments:   {}", launch.arguments);
    }
    if !launch.working_dir.is_empty() {
        let _ = writeln!(out, "working dir: {}", launch.working_dir);
    }
    for name in &launch.env {
        let _ = writeln!(out, "env:         {name}=TRUE");
    }
    out
}

/// Print the active configuration, or switch to `name`.
pub async fn configuration(client: &mut LspClient, name: Option<&str>) -> Result<()> {
    let status = client.status();
    let Some(name) = name else {
        match status.configuration() {
            Some(active) => {
                println!("{active}");
                for other in status.configurations() {
                    let marker = if other == active { '*' } else { ' ' };
                    println!("{marker} {other}");
                }
            }
            None => println!("{}", status.label()),
        }
        return Ok(());
    };
    let known = status.configurations();
    if !known.is_empty() && !known.iter().any(|c| c == name) {
        bail!(
            "unknown configuration `{name}` (available: {})",
            known.join(", ")
        );
    }
    let active = client.change_configuration(name).await?;
    println!("{}", client.status().label());
    tracing::info!(configuration = %active, "Configuration changed");
    Ok(())
}

/// Decide which settings view a session edits.
pub async fn settings_view(
    client: &LspClient,
    scope: SettingsScope,
    project: Option<&str>,
    manifest: Option<&Path>,
) -> Result<SettingsView> {
    if scope == SettingsScope::Workspace {
        if project.is_some() || manifest.is_some() {
            tracing::warn!("--project and --manifest only apply to project settings");
        }
        return Ok(SettingsView::workspace());
    }
    if let Some(name) = resolve_project(client, project, manifest).await? {
        return Ok(SettingsView::project(name));
    }
    let projects = client.projects().await?;
    pick_project(&projects, manifest).map(SettingsView::project)
}

fn pick_project(projects: &[Project], manifest: Option<&Path>) -> Result<String> {
    match projects {
        [only] => Ok(only.name.clone()),
        [] => bail!("the workspace has no projects"),
        many => {
            let names: Vec<&str> = many.iter().map(|p| p.name.as_str()).collect();
            match manifest {
                Some(path) => bail!(
                    "{} does not belong to a project; pick one with --project ({})",
                    path.display(),
                    names.join(", ")
                ),
                None => bail!("pick a project with --project ({})", names.join(", ")),
            }
        }
    }
}
