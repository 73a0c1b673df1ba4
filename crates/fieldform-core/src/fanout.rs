//! Parallel leaf dispatch
//!
//! In parallel mode the walk only collects leaf jobs. The jobs then run on
//! scoped worker threads fed through a channel, each against an owned value
//! snapshot and a shared view of the root. Results are written back and
//! field errors recorded in declaration order once every worker has
//! stopped, so the outcome does not depend on scheduling.
//!
//! Copyright (c) 2025 Fieldform Team
//! Licensed under the Apache-2.0 license

use crate::cancel::CancelToken;
use crate::directive::Directive;
use crate::dispatch::{write_back, Dispatcher, LeafContext};
use crate::error::{Error, Result};
use crate::field_error::FieldError;
use crate::namespace::{locate, Step, LEFT_BRACKET, NAMESPACE_SEPARATOR, RIGHT_BRACKET};
use crate::registry::Registry;
use crate::value::{Kind, Reflect, Value};
use crate::walk::{Leaf, LeafSink};
use crossbeam_channel::unbounded;
use log::warn;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// An owned copy of one leaf
pub(crate) struct Job {
    starts_group: bool,
    group: usize,
    steps: Vec<Step>,
    parent_depth: usize,
    namespace: String,
    struct_namespace: String,
    field: String,
    struct_field: String,
    chain: Vec<Directive>,
    kind: Kind,
    nullable: bool,
    value: Value,
}

struct Outcome {
    value: Value,
    error: Option<FieldError>,
    fatal: Option<Error>,
}

impl Job {
    fn run(&self, dispatcher: &Dispatcher<'_>, root: &dyn Reflect) -> Outcome {
        let ctx = LeafContext {
            root,
            parent: locate(root, &self.steps[..self.parent_depth]),
            namespace: &self.namespace,
            struct_namespace: &self.struct_namespace,
            field: &self.field,
            struct_field: &self.struct_field,
            kind: self.kind,
            nullable: self.nullable,
        };

        let mut value = self.value.clone();
        let mut errors = Vec::new();
        let fatal = dispatcher
            .apply(&ctx, &self.chain, &mut value, &mut errors)
            .err();

        Outcome {
            value,
            error: errors.pop(),
            fatal,
        }
    }

    /// Top-level field this job belongs to
    fn group_name(&self) -> &str {
        let ns = &self.struct_namespace;
        let end = if ns.starts_with(LEFT_BRACKET) {
            ns.find(RIGHT_BRACKET).map_or(ns.len(), |i| i + 1)
        } else {
            ns.find([NAMESPACE_SEPARATOR, LEFT_BRACKET]).unwrap_or(ns.len())
        };
        &ns[..end]
    }
}

/// Collects leaves as owned jobs instead of applying them
pub(crate) struct JobCollector<'r> {
    registry: &'r Registry,
    jobs: Vec<Job>,
    cross_field: bool,
}

impl<'r> JobCollector<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            jobs: Vec::new(),
            cross_field: false,
        }
    }

    /// Whether any collected chain uses a cross-field directive
    pub fn has_cross_field(&self) -> bool {
        self.cross_field
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }
}

impl LeafSink for JobCollector<'_> {
    fn leaf(&mut self, _root: &mut dyn Reflect, leaf: Leaf<'_>) -> Result<()> {
        let registry = self.registry;
        self.cross_field |= leaf
            .chain
            .iter()
            .any(|d| registry.is_cross_field(d.name()));

        let starts_group = self.jobs.last().map_or(true, |last| last.group != leaf.group);
        self.jobs.push(Job {
            starts_group,
            group: leaf.group,
            steps: leaf.steps.to_vec(),
            parent_depth: leaf.parent_depth,
            namespace: leaf.namespace.display().to_string(),
            struct_namespace: leaf.namespace.structural().to_string(),
            field: leaf.field.to_string(),
            struct_field: leaf.struct_field.to_string(),
            chain: leaf.chain.to_vec(),
            kind: leaf.kind,
            nullable: leaf.nullable,
            value: leaf.value,
        });
        Ok(())
    }
}

/// Run collected jobs on up to `workers` threads
///
/// Falls back to in-order execution when a chain reads other fields, since
/// those reads must observe earlier rewrites.
pub(crate) fn run(
    collector: JobCollector<'_>,
    root: &mut dyn Reflect,
    dispatcher: &Dispatcher<'_>,
    workers: usize,
    cancel: Option<&CancelToken>,
    errors: &mut Vec<FieldError>,
) -> Result<()> {
    if collector.has_cross_field() {
        warn!("Cross-field directive in use, dispatching {} fields sequentially", collector.len());
        return run_sequential(collector.jobs, root, dispatcher, cancel, errors);
    }

    let jobs = collector.jobs;
    if jobs.is_empty() {
        return Ok(());
    }

    let workers = workers.clamp(1, jobs.len());
    debug!(jobs = jobs.len(), workers, "dispatching fields in parallel");

    let mut outcomes: Vec<Option<Outcome>> = Vec::with_capacity(jobs.len());
    outcomes.resize_with(jobs.len(), || None);

    {
        let top: &dyn Reflect = &*root;
        let stop = AtomicBool::new(false);
        let (job_tx, job_rx) = unbounded::<usize>();
        let (out_tx, out_rx) = unbounded::<(usize, Outcome)>();

        for index in 0..jobs.len() {
            if job_tx.send(index).is_err() {
                break;
            }
        }
        drop(job_tx);

        let jobs = &jobs;
        let stop = &stop;
        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let out_tx = out_tx.clone();
                scope.spawn(move || {
                    while !stop.load(Ordering::Acquire) {
                        let Ok(index) = job_rx.recv() else {
                            break;
                        };
                        let job = &jobs[index];
                        if job.starts_group && cancel.is_some_and(CancelToken::is_cancelled) {
                            stop.store(true, Ordering::Release);
                            break;
                        }

                        let outcome = job.run(dispatcher, top);
                        if outcome.fatal.is_some() {
                            stop.store(true, Ordering::Release);
                        }
                        if out_tx.send((index, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(out_tx);

        for (index, outcome) in out_rx.try_iter() {
            outcomes[index] = Some(outcome);
        }
    }

    for (job, outcome) in jobs.iter().zip(outcomes) {
        // Jobs are dequeued in order and a fatal outcome returns before any
        // gap, so the first gap is where a worker observed cancellation.
        let Some(outcome) = outcome else {
            return Err(Error::Cancelled {
                namespace: job.group_name().to_string(),
            });
        };
        settle(job, outcome, root, errors)?;
    }
    Ok(())
}

fn run_sequential(
    jobs: Vec<Job>,
    root: &mut dyn Reflect,
    dispatcher: &Dispatcher<'_>,
    cancel: Option<&CancelToken>,
    errors: &mut Vec<FieldError>,
) -> Result<()> {
    for job in &jobs {
        if job.starts_group && cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(Error::Cancelled {
                namespace: job.group_name().to_string(),
            });
        }
        let outcome = job.run(dispatcher, &*root);
        settle(job, outcome, root, errors)?;
    }
    Ok(())
}

/// Write one outcome back and record its failure
fn settle(
    job: &Job,
    outcome: Outcome,
    root: &mut dyn Reflect,
    errors: &mut Vec<FieldError>,
) -> Result<()> {
    let written = if outcome.value != job.value {
        write_back(root, &job.steps, &job.struct_namespace, outcome.value)
    } else {
        Ok(())
    };
    errors.extend(outcome.error);
    if let Some(fatal) = outcome.fatal {
        return Err(fatal);
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(group: usize, starts_group: bool, struct_namespace: &str, chain: &str, value: Value) -> Job {
        Job {
            starts_group,
            group,
            steps: vec![Step::Index(group)],
            parent_depth: 0,
            namespace: struct_namespace.to_string(),
            struct_namespace: struct_namespace.to_string(),
            field: struct_namespace.to_string(),
            struct_field: struct_namespace.to_string(),
            chain: crate::directive::parse(chain),
            kind: Kind::String,
            nullable: false,
            value,
        }
    }

    fn collector(registry: &Registry, jobs: Vec<Job>) -> JobCollector<'_> {
        let mut collector = JobCollector::new(registry);
        collector.jobs = jobs;
        collector
    }

    #[test]
    fn test_group_name() {
        let j = job(0, true, "addresses[2].city", "trim", Value::from(""));
        assert_eq!(j.group_name(), "addresses");
        let j = job(0, true, "name", "trim", Value::from(""));
        assert_eq!(j.group_name(), "name");
        let j = job(0, true, "[3].name", "trim", Value::from(""));
        assert_eq!(j.group_name(), "[3]");
    }

    #[test]
    fn test_parallel_results_are_ordered() {
        let mut registry = Registry::with_builtins();
        registry
            .register("nonempty", |fl| Ok(fl.as_str().is_some_and(|s| !s.is_empty())))
            .unwrap();
        let dispatcher = Dispatcher::new(&registry);

        let mut data: Vec<String> = (0..32)
            .map(|i| if i % 5 == 0 { "  ".to_string() } else { format!(" v{} ", i) })
            .collect();
        let jobs = data
            .iter()
            .enumerate()
            .map(|(i, v)| job(i, true, &format!("[{}]", i), "trim,nonempty", Value::from(v.as_str())))
            .collect();

        let mut errors = Vec::new();
        run(collector(&registry, jobs), &mut data, &dispatcher, 4, None, &mut errors).unwrap();

        assert_eq!(data[1], "v1");
        assert_eq!(data[0], "");
        let failed: Vec<&str> = errors.iter().map(|e| e.struct_namespace()).collect();
        assert_eq!(failed, vec!["[0]", "[5]", "[10]", "[15]", "[20]", "[25]", "[30]"]);
    }

    #[test]
    fn test_fatal_error_writes_back_earlier_jobs() {
        let registry = Registry::with_builtins();
        let dispatcher = Dispatcher::new(&registry);
        let mut data = vec![" a ".to_string(), " b ".to_string()];
        let jobs = vec![
            job(0, true, "[0]", "trim", Value::from(" a ")),
            job(1, true, "[1]", "trim,bogus", Value::from(" b ")),
        ];

        let mut errors = Vec::new();
        let err = run(collector(&registry, jobs), &mut data, &dispatcher, 1, None, &mut errors)
            .unwrap_err();

        assert!(matches!(err, Error::UnknownDirective { .. }));
        assert_eq!(data, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_cancelled_before_first_group() {
        let registry = Registry::with_builtins();
        let dispatcher = Dispatcher::new(&registry);
        let token = CancelToken::new();
        token.cancel();

        let mut data = vec![" a ".to_string()];
        let jobs = vec![job(0, true, "[0]", "trim", Value::from(" a "))];

        let mut errors = Vec::new();
        let err = run(collector(&registry, jobs), &mut data, &dispatcher, 2, Some(&token), &mut errors)
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled { ref namespace } if namespace == "[0]"));
        assert_eq!(data[0], " a ");
    }
}
