use std::{
    collections::{HashMap, HashSet},
    io::Write,
    path::Path,
};

use anyhow::{anyhow, bail, Context};
use log::{debug, info};

use crate::{
    archive::{find_archive_for, find_entry, read_entry, LineRange},
    cache::ModuleCache,
    model::{selector::SourceFilter, Coordinate, FileId, SourceArtifact},
    process::{CancellationToken, ProcessRunner},
    resolver::{self, GradleResolver, ResolutionResult, ResolveConfiguration},
    search::{self, ripgrep, SearchRequest},
};

const DEPS_HINT: &str =
    "Try: ksrc deps (list resolved coords), then ksrc fetch <coord> to download sources.";

/// External collaborators shared by every command.
#[derive(Clone, Copy)]
pub struct Tools<'a> {
    pub runner: &'a dyn ProcessRunner,
    pub cache: &'a ModuleCache,
    pub cancel: &'a CancellationToken,
}

/// Sources selected for a command, plus the raw resolution they came from.
#[derive(Debug, Default)]
pub struct ResolvedSources {
    pub sources: Vec<SourceArtifact>,
    pub resolution: ResolutionResult,
    pub from_cache: bool,
}

/// The coordinate to look up in the module cache when resolution selected nothing.
///
/// Only an exact `group:artifact` without a version qualifies, and never in
/// "search all resolved" mode.
pub fn cache_fallback_target(
    config: &ResolveConfiguration,
    allow_cache_fallback: bool,
) -> Option<Coordinate> {
    if !allow_cache_fallback || config.search_all {
        return None;
    }
    config
        .filter
        .exact_coordinate()
        .filter(|coordinate| coordinate.version.is_none())
}

pub fn resolve_sources(
    tools: Tools<'_>,
    config: &ResolveConfiguration,
    apply_filters: bool,
    allow_cache_fallback: bool,
) -> anyhow::Result<ResolvedSources> {
    let resolution = resolver::resolve(config, tools.runner, tools.cancel)?;
    let mut sources = if apply_filters {
        config.filter.apply(resolution.sources.clone())
    } else {
        resolution.sources.clone()
    };

    let mut from_cache = false;
    if sources.is_empty() {
        if let Some(coordinate) = cache_fallback_target(config, allow_cache_fallback) {
            match tools.cache.find_sources(&coordinate) {
                Ok(cached) => {
                    info!("Using cached sources for {}", coordinate);
                    sources = cached;
                    from_cache = true;
                }
                Err(e) => debug!("No cached sources for {}: {}", coordinate, e),
            }
        }
    }

    Ok(ResolvedSources {
        sources,
        resolution,
        from_cache,
    })
}

/// Error for an empty selection, with hints on how to get sources.
pub fn no_sources_error(
    config: &ResolveConfiguration,
    resolution: &ResolutionResult,
    hint: &str,
) -> anyhow::Error {
    let mut parts = Vec::new();
    if config.offline {
        parts.push("You ran with --offline; rerun without it to allow downloads.".to_string());
    }
    if !hint.trim().is_empty() {
        parts.push(hint.to_string());
    }
    if !resolution.attempts.is_empty() {
        let tried: Vec<String> = resolution.attempts.iter().map(|a| a.to_string()).collect();
        parts.push(format!("Tried: {}.", tried.join("; ")));
    }
    if parts.is_empty() {
        anyhow!("E_NO_SOURCES: no sources resolved")
    } else {
        anyhow!("E_NO_SOURCES: no sources resolved. {}", parts.join(" "))
    }
}

pub fn hint_for_filter(config: &ResolveConfiguration) -> String {
    if config.search_all {
        return DEPS_HINT.to_string();
    }
    match config.filter.exact_coordinate() {
        Some(coordinate) if coordinate.version.is_some() => {
            format!("Try: ksrc fetch {} to download sources.", coordinate)
        }
        Some(_) => "Try: add a version (group:artifact:version) or run ksrc deps to see resolved coords."
            .to_string(),
        None => DEPS_HINT.to_string(),
    }
}

fn hint_for_coordinate(coordinate: &Coordinate) -> String {
    match coordinate.version {
        Some(_) => format!("Try: ksrc fetch {} to download sources.", coordinate),
        None => DEPS_HINT.to_string(),
    }
}

fn pinned_to(config: &ResolveConfiguration, coordinate: &Coordinate) -> ResolveConfiguration {
    ResolveConfiguration {
        filter: SourceFilter {
            module: coordinate.to_string(),
            version: coordinate.version.clone().unwrap_or_default(),
            ..config.filter.clone()
        },
        ..config.clone()
    }
}

fn require_selector(config: &ResolveConfiguration, usage: &str) -> anyhow::Result<()> {
    let filter = &config.filter;
    if filter.module.trim().is_empty()
        && filter.group.trim().is_empty()
        && filter.artifact.trim().is_empty()
    {
        bail!("path requires --module or a file-id. {}", usage);
    }
    Ok(())
}

/// Handler to resolve command
pub fn do_resolve(
    tools: Tools<'_>,
    config: &ResolveConfiguration,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let resolved = resolve_sources(tools, config, true, true)?;
    for source in &resolved.sources {
        writeln!(out, "{}|{}", source.coordinate, source.path.display())?;
    }
    Ok(())
}

/// Handler to deps command
pub fn do_deps(
    tools: Tools<'_>,
    config: &ResolveConfiguration,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let resolved = resolve_sources(tools, config, false, false)?;
    let paths: HashMap<String, &Path> = resolved
        .sources
        .iter()
        .map(|source| (source.coordinate.to_string(), source.path.as_path()))
        .collect();

    let mut seen = HashSet::new();
    for dep in &resolved.resolution.deps {
        let key = dep.to_string();
        if !seen.insert(key.clone()) {
            continue;
        }
        let path = paths.get(&key);
        writeln!(
            out,
            "{}  [sources: {}]  [path: {}]",
            key,
            if path.is_some() { "yes" } else { "no" },
            path.map(|p| p.display().to_string()).unwrap_or_default()
        )?;
    }
    if resolved.resolution.deps.is_empty() {
        for source in &resolved.sources {
            let key = source.coordinate.to_string();
            if seen.insert(key.clone()) {
                writeln!(
                    out,
                    "{}  [sources: yes]  [path: {}]",
                    key,
                    source.path.display()
                )?;
            }
        }
    }
    Ok(())
}

pub struct SearchOptions {
    pub query: String,
    pub context: Option<usize>,
    /// Comma separated ripgrep arguments.
    pub rg_args: String,
    /// Arguments given after `--`.
    pub rg_extra: Vec<String>,
    pub show_extracted_path: bool,
    pub file_glob: String,
}

/// Handler to search command
pub fn do_search(
    tools: Tools<'_>,
    config: &ResolveConfiguration,
    options: SearchOptions,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    if config.filter.module.trim().is_empty() && !config.search_all {
        bail!(
            "E_NO_MODULE: <module> required unless --all is provided. \
             Try: ksrc search --all -q \"<pattern>\" or ksrc search group:artifact -q \"<pattern>\""
        );
    }
    if options.query.trim().is_empty() {
        bail!("query is required. Try: ksrc search --all -q \"<pattern>\"");
    }

    let resolved = resolve_sources(tools, config, true, true)?;
    if resolved.sources.is_empty() {
        return Err(no_sources_error(
            config,
            &resolved.resolution,
            &hint_for_filter(config),
        ));
    }

    let mut extra_args = crate::config::split_csv(&options.rg_args);
    if let Some(context) = options.context.filter(|c| *c > 0) {
        extra_args.extend(["-C".to_string(), context.to_string()]);
    }
    extra_args.extend(options.rg_extra);

    let request = SearchRequest {
        extra_args,
        file_glob: options.file_glob,
        work_dir: Some(config.project_dir.clone()),
        ..SearchRequest::new(options.query, resolved.sources)
    };
    for found in search::search(&request, tools.runner, tools.cancel)? {
        if options.show_extracted_path {
            writeln!(
                out,
                "{} {}:{}:{}:{}",
                found.file_id, found.file, found.line, found.column, found.text
            )?;
        } else {
            writeln!(out, "{}", found)?;
        }
    }
    Ok(())
}

/// Handler to cat command
pub fn do_cat(
    tools: Tools<'_>,
    config: &ResolveConfiguration,
    target: &str,
    lines: Option<&str>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let target = target.trim();
    let range = lines
        .filter(|lines| !lines.trim().is_empty())
        .map(str::parse::<LineRange>)
        .transpose()?;

    if FileId::looks_like(target) {
        let id: FileId = target.parse()?;
        let config = pinned_to(config, &id.coordinate);
        let resolved = resolve_sources(tools, &config, true, false)?;
        if resolved.sources.is_empty() {
            return Err(no_sources_error(
                &config,
                &resolved.resolution,
                &hint_for_coordinate(&id.coordinate),
            ));
        }
        let source = find_archive_for(&resolved.sources, &id.coordinate)?;
        out.write_all(&read_entry(&source.path, &id.path, range)?)?;
        return Ok(());
    }

    require_selector(
        config,
        "Try: ksrc cat <file-id> or ksrc cat --module group:artifact[:version] <path>",
    )?;
    let resolved = resolve_sources(tools, config, true, true)?;
    if resolved.sources.is_empty() {
        return Err(no_sources_error(
            config,
            &resolved.resolution,
            &hint_for_filter(config),
        ));
    }
    let (source, inner) = find_entry(&resolved.sources, target)?;
    out.write_all(&read_entry(&source.path, &inner, range)?)?;
    Ok(())
}

/// Handler to where command
pub fn do_where(
    tools: Tools<'_>,
    config: &ResolveConfiguration,
    target: &str,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let target = target.trim();

    if FileId::looks_like(target) {
        let id: FileId = target.parse()?;
        let config = ResolveConfiguration {
            dependency: id.coordinate.version.is_some().then(|| id.coordinate.to_string()),
            ..pinned_to(config, &id.coordinate)
        };
        let resolved = resolve_sources(tools, &config, true, false)?;
        let source = find_archive_for(&resolved.sources, &id.coordinate)?;
        writeln!(out, "{}|{}", id, source.path.display())?;
        return Ok(());
    }

    if let Ok(coordinate) = Coordinate::parse(target) {
        let config = ResolveConfiguration {
            dependency: coordinate.version.is_some().then(|| coordinate.to_string()),
            ..pinned_to(config, &coordinate)
        };
        let resolved = resolve_sources(tools, &config, true, true)?;
        let source = find_archive_for(&resolved.sources, &coordinate)?;
        writeln!(out, "{}|{}", source.coordinate, source.path.display())?;
        return Ok(());
    }

    require_selector(config, "Try: ksrc where <file-id> or ksrc where --module group:artifact <path>")?;
    let resolved = resolve_sources(tools, config, true, true)?;
    let (source, inner) = find_entry(&resolved.sources, target)?;
    writeln!(
        out,
        "{}|{}",
        FileId::new(source.coordinate.clone(), inner),
        source.path.display()
    )?;
    Ok(())
}

/// Handler to fetch command
pub fn do_fetch(
    tools: Tools<'_>,
    config: &ResolveConfiguration,
    coordinate: &str,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let coordinate = Coordinate::parse(coordinate.trim())?;
    if coordinate.version.is_none() {
        bail!("version required for fetch. Use group:artifact:version.");
    }
    let config = ResolveConfiguration {
        dependency: Some(coordinate.to_string()),
        ..pinned_to(config, &coordinate)
    };
    let resolved = resolve_sources(tools, &config, false, false)?;
    if resolved.sources.is_empty() {
        return Err(no_sources_error(
            &config,
            &resolved.resolution,
            "Try: verify the coordinate exists in the project or run ksrc deps to see resolved coords.",
        ));
    }
    for source in resolved
        .sources
        .iter()
        .filter(|source| source.coordinate == coordinate)
    {
        writeln!(out, "{}|{}", source.coordinate, source.path.display())?;
    }
    Ok(())
}

/// Handler to doctor command. Reports problems instead of failing on them.
pub fn do_doctor(
    tools: Tools<'_>,
    config: &ResolveConfiguration,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match tools.runner.which(ripgrep::PROGRAM) {
        Some(_) => writeln!(out, "rg: ok")?,
        None => writeln!(out, "rg: not found on PATH")?,
    }

    let root = resolver::canonical_path(&config.project_dir);
    let gradle = GradleResolver::new(tools.runner, config, root.clone(), tools.cancel);
    match gradle.find_gradle(&root) {
        Ok(path) if path.starts_with(&root) => writeln!(out, "gradle: {}", path.display())?,
        Ok(_) => writeln!(out, "gradle: gradle on PATH")?,
        Err(e) => writeln!(out, "gradle: {}", e)?,
    }

    let modules = tools.cache.modules_dir();
    if modules.is_dir() {
        writeln!(out, "gradle cache: {}", modules.display())?;
    } else {
        writeln!(out, "gradle cache: missing ({})", modules.display())?;
    }

    match resolver::resolve(config, tools.runner, tools.cancel) {
        Ok(result) => {
            writeln!(out, "gradle resolve: ok")?;
            for warning in &result.warnings {
                writeln!(out, "warning: {}", warning)?;
            }
        }
        Err(e) if e.is_cancelled() => return Err(e).context("doctor interrupted"),
        Err(e) => writeln!(out, "gradle resolve: error: {}", e)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use super::*;
    use crate::{
        process::testing::{exit, ok, ScriptedRunner},
        search::testing::{write_archive, FakeRipgrep},
    };

    use pretty_assertions::assert_eq;

    struct Fixture {
        _temp: tempfile::TempDir,
        root: PathBuf,
        cache: ModuleCache,
        runner: ScriptedRunner,
        cancel: CancellationToken,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = tempfile::tempdir().unwrap();
            let base = temp.path().canonicalize().unwrap();
            let root = base.join("project");
            fs::create_dir_all(&root).unwrap();
            Fixture {
                cache: ModuleCache::new(base.join("gradle-home")),
                runner: ScriptedRunner::with_tools(&["gradle"]),
                cancel: CancellationToken::new(),
                root,
                _temp: temp,
            }
        }

        fn tools(&self) -> Tools<'_> {
            Tools {
                runner: &self.runner,
                cache: &self.cache,
                cancel: &self.cancel,
            }
        }

        fn config(&self, module: &str) -> ResolveConfiguration {
            ResolveConfiguration {
                project_dir: self.root.clone(),
                filter: SourceFilter {
                    module: module.to_string(),
                    ..Default::default()
                },
                ..Default::default()
            }
        }

        fn cache_sources(&self, group: &str, artifact: &str, version: &str) -> PathBuf {
            let mut dir = self.cache.modules_dir();
            dir.extend(group.split('.'));
            let dir = dir.join(artifact).join(version).join("abc123");
            fs::create_dir_all(&dir).unwrap();
            write_archive(
                &dir,
                &format!("{artifact}-{version}-sources.jar"),
                &[("demo/Cached.kt", "cached\n")],
            )
        }

        fn output(&self, run: impl FnOnce(Tools<'_>, &mut Vec<u8>) -> anyhow::Result<()>) -> String {
            let mut out = Vec::new();
            run(self.tools(), &mut out).unwrap();
            String::from_utf8(out).unwrap()
        }
    }

    #[test]
    fn fallback_only_for_unversioned_exact_selector() {
        let fixture = Fixture::new();
        let exact = fixture.config("com.example:demo");
        assert_eq!(
            cache_fallback_target(&exact, true),
            Some(Coordinate::parse("com.example:demo").unwrap())
        );
        assert_eq!(cache_fallback_target(&exact, false), None);
        assert_eq!(
            cache_fallback_target(&fixture.config("com.example:demo:1.0"), true),
            None
        );
        assert_eq!(cache_fallback_target(&fixture.config("demo"), true), None);
    }

    #[test]
    fn search_all_never_uses_cache() {
        let fixture = Fixture::new();
        let config = ResolveConfiguration {
            search_all: true,
            ..fixture.config("com.example:demo")
        };
        assert_eq!(cache_fallback_target(&config, true), None);

        fixture.cache_sources("com.example", "demo", "1.0");
        let resolved = resolve_sources(fixture.tools(), &config, true, true).unwrap();
        assert!(resolved.sources.is_empty());
        assert!(!resolved.from_cache);
    }

    #[test]
    fn empty_resolution_falls_back_to_cache() {
        let fixture = Fixture::new();
        let archive = fixture.cache_sources("com.example", "demo", "1.2.0");
        fixture.cache_sources("com.example", "demo", "1.10.0");

        let resolved =
            resolve_sources(fixture.tools(), &fixture.config("com.example:demo"), true, true)
                .unwrap();
        assert!(resolved.from_cache);
        assert_eq!(resolved.sources.len(), 1);
        assert_eq!(
            resolved.sources[0].coordinate,
            Coordinate::parse("com.example:demo:1.10.0").unwrap()
        );
        assert_ne!(resolved.sources[0].path, archive);
    }

    #[test]
    fn resolve_prints_filtered_sources() {
        let mut fixture = Fixture::new();
        let root = fixture.root.clone();
        fixture.runner.respond(
            &root,
            ok("KSRC|com.example:demo:1.0|/c/demo-sources.jar\nKSRC|org.other:lib:2.0|/c/lib-sources.jar\n"),
        );
        let config = fixture.config("com.example:*");
        let output = fixture.output(|tools, out| do_resolve(tools, &config, out));
        assert_eq!(output, "com.example:demo:1.0|/c/demo-sources.jar\n");
    }

    #[test]
    fn deps_reports_source_availability() {
        let mut fixture = Fixture::new();
        let root = fixture.root.clone();
        fixture.runner.respond(
            &root,
            ok("KSRCDEP|com.example:demo:1.0\nKSRCDEP|com.example:nosrc:3.0\nKSRC|com.example:demo:1.0|/c/demo-sources.jar\n"),
        );
        let config = fixture.config("");
        let output = fixture.output(|tools, out| do_deps(tools, &config, out));
        assert_eq!(
            output,
            "com.example:demo:1.0  [sources: yes]  [path: /c/demo-sources.jar]\n\
             com.example:nosrc:3.0  [sources: no]  [path: ]\n"
        );
    }

    #[test]
    fn search_requires_module_or_all() {
        let fixture = Fixture::new();
        let options = SearchOptions {
            query: "x".to_string(),
            context: None,
            rg_args: String::new(),
            rg_extra: Vec::new(),
            show_extracted_path: false,
            file_glob: "*.kt".to_string(),
        };
        let error = do_search(fixture.tools(), &fixture.config(""), options, &mut Vec::new())
            .unwrap_err();
        assert!(error.to_string().starts_with("E_NO_MODULE"), "{error}");
        assert_eq!(fixture.runner.call_count(), 0);
    }

    /// Gradle scripted, ripgrep imitated.
    struct GradleAndRipgrep {
        gradle: ScriptedRunner,
        rg: FakeRipgrep,
    }

    impl ProcessRunner for GradleAndRipgrep {
        fn run(
            &self,
            invocation: &crate::process::Invocation,
            cancel: &CancellationToken,
        ) -> Result<crate::process::ProcessOutput, crate::process::ProcessError> {
            if invocation.program_name() == ripgrep::PROGRAM {
                self.rg.run(invocation, cancel)
            } else {
                self.gradle.run(invocation, cancel)
            }
        }

        fn which(&self, name: &str) -> Option<PathBuf> {
            self.rg.which(name).or_else(|| self.gradle.which(name))
        }
    }

    #[test]
    fn search_prints_file_ids() {
        let fixture = Fixture::new();
        let archive = write_archive(
            &fixture.root,
            "demo-sources.jar",
            &[("demo/A.kt", "fun a()\nfun target()\n"), ("demo/B.java", "target")],
        );
        let mut runner = GradleAndRipgrep {
            gradle: ScriptedRunner::with_tools(&["gradle"]),
            rg: FakeRipgrep::new(true),
        };
        runner.gradle.respond(
            &fixture.root,
            ok(&format!("KSRC|com.example:demo:1.0|{}\n", archive.display())),
        );
        let tools = Tools {
            runner: &runner,
            ..fixture.tools()
        };
        let options = SearchOptions {
            query: "target".to_string(),
            context: None,
            rg_args: "--max-count=5".to_string(),
            rg_extra: vec!["--fixed-strings".to_string()],
            show_extracted_path: false,
            file_glob: "*.kt".to_string(),
        };
        let mut out = Vec::new();
        do_search(tools, &fixture.config("demo"), options, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "com.example:demo:1.0!/demo/A.kt 2:5:fun target()\n"
        );
        let call = runner.rg.search_call();
        let args: Vec<_> = call.args.iter().map(|a| a.to_string_lossy().to_string()).collect();
        let max_count = args.iter().position(|a| a == "--max-count=5").unwrap();
        assert_eq!(args[max_count + 1], "--fixed-strings");
    }

    #[test]
    fn no_sources_error_lists_hints_and_attempts() {
        let mut fixture = Fixture::new();
        let root = fixture.root.clone();
        fixture.runner.respond(&root, ok(""));
        let config = ResolveConfiguration {
            offline: true,
            ..fixture.config("com.example:demo:1.0")
        };
        let options = SearchOptions {
            query: "x".to_string(),
            context: None,
            rg_args: String::new(),
            rg_extra: Vec::new(),
            show_extracted_path: false,
            file_glob: "*.kt".to_string(),
        };
        let error = do_search(fixture.tools(), &config, options, &mut Vec::new())
            .unwrap_err()
            .to_string();
        assert!(error.starts_with("E_NO_SOURCES: no sources resolved. "), "{error}");
        assert!(error.contains("--offline"), "{error}");
        assert!(error.contains("ksrc fetch com.example:demo:1.0"), "{error}");
        assert!(error.contains("debug compile classpath"), "{error}");
    }

    #[test]
    fn cat_file_id_with_line_range() {
        let mut fixture = Fixture::new();
        let archive = write_archive(
            &fixture.root,
            "demo-sources.jar",
            &[("demo/A.kt", "one\ntwo\nthree\n")],
        );
        let root = fixture.root.clone();
        fixture.runner.respond(
            &root,
            ok(&format!("KSRC|com.example:demo:1.0|{}\n", archive.display())),
        );
        let config = fixture.config("");
        let output = fixture.output(|tools, out| {
            do_cat(tools, &config, "com.example:demo:1.0!/demo/A.kt", Some("2,3"), out)
        });
        assert_eq!(output, "two\nthree\n");
        assert!(fixture.runner.calls.borrow()[0]
            .args
            .iter()
            .any(|arg| arg == "-PksrcModule=com.example:demo:1.0"));
    }

    #[test]
    fn cat_path_requires_selector() {
        let fixture = Fixture::new();
        let error = do_cat(fixture.tools(), &fixture.config(""), "demo/A.kt", None, &mut Vec::new())
            .unwrap_err();
        assert!(error.to_string().contains("--module"), "{error}");
    }

    #[test]
    fn cat_path_through_cached_sources() {
        let fixture = Fixture::new();
        fixture.cache_sources("com.example", "demo", "1.0");
        let config = fixture.config("com.example:demo");
        let output = fixture.output(|tools, out| do_cat(tools, &config, "Cached.kt", None, out));
        assert_eq!(output, "cached\n");
    }

    #[test]
    fn where_coordinate_queries_single_dependency() {
        let mut fixture = Fixture::new();
        let root = fixture.root.clone();
        fixture.runner.respond(
            &root,
            ok("KSRC|com.example:demo:1.0|/c/demo-1.0-sources.jar\n"),
        );
        let config = fixture.config("");
        let output =
            fixture.output(|tools, out| do_where(tools, &config, "com.example:demo:1.0", out));
        assert_eq!(output, "com.example:demo:1.0|/c/demo-1.0-sources.jar\n");
        assert!(fixture.runner.calls.borrow()[0]
            .args
            .iter()
            .any(|arg| arg == "-PksrcDep=com.example:demo:1.0"));
    }

    #[test]
    fn where_path_prints_file_id() {
        let mut fixture = Fixture::new();
        let archive = write_archive(
            &fixture.root,
            "demo-sources.jar",
            &[("kotlinx/demo/A.kt", "")],
        );
        let root = fixture.root.clone();
        fixture.runner.respond(
            &root,
            ok(&format!("KSRC|com.example:demo:1.0|{}\n", archive.display())),
        );
        let config = fixture.config("com.example:demo");
        let output = fixture.output(|tools, out| do_where(tools, &config, "demo/A.kt", out));
        assert_eq!(
            output,
            format!(
                "com.example:demo:1.0!/kotlinx/demo/A.kt|{}\n",
                archive.display()
            )
        );
    }

    #[test]
    fn fetch_requires_version_and_prints_matches() {
        let mut fixture = Fixture::new();
        let error = do_fetch(
            fixture.tools(),
            &fixture.config(""),
            "com.example:demo",
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(error.to_string().contains("version required"));

        let root = fixture.root.clone();
        fixture.runner.respond(
            &root,
            ok("KSRC|com.example:demo:1.0|/c/demo-1.0-sources.jar\nKSRC|com.example:demo:0.9|/c/old.jar\n"),
        );
        let config = fixture.config("");
        let output = fixture.output(|tools, out| do_fetch(tools, &config, "com.example:demo:1.0", out));
        assert_eq!(output, "com.example:demo:1.0|/c/demo-1.0-sources.jar\n");
    }

    #[test]
    fn fetch_failure_propagates_stderr() {
        let mut fixture = Fixture::new();
        let root = fixture.root.clone();
        fixture
            .runner
            .respond(&root, exit(1, "", "Could not find com.example:demo:9.9"));
        let error = do_fetch(
            fixture.tools(),
            &fixture.config(""),
            "com.example:demo:9.9",
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(
            format!("{error:#}").contains("Could not find com.example:demo:9.9"),
            "{error:#}"
        );
    }

    #[test]
    fn doctor_reports_instead_of_failing() {
        let mut fixture = Fixture::new();
        fixture.runner.tools.clear();
        let config = fixture.config("");
        let output = fixture.output(|tools, out| do_doctor(tools, &config, out));
        assert_eq!(
            output,
            format!(
                "rg: not found on PATH\n\
                 gradle: gradle not found (no ./gradlew and gradle not on PATH)\n\
                 gradle cache: missing ({})\n\
                 gradle resolve: error: {}\n",
                fixture.cache.modules_dir().display(),
                resolver::resolve(&config, &fixture.runner, &fixture.cancel).unwrap_err()
            )
        );
    }
}
