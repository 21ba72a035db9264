//! Stress command - register listeners on garbage and drive them to completion.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::Result;
use clap::Args;
use gc_listen::init;
use gcl_runtime::{Env, ErrorKind, Value};
use serde::Serialize;

use crate::config::Config;

#[derive(Args)]
pub struct StressCommand {
    /// Objects to register
    #[arg(long, short = 'n')]
    pub objects: Option<usize>,

    /// Objects per collection (0 = everything in one collection)
    #[arg(long)]
    pub batch: Option<usize>,

    /// Make every n-th callback throw (0 = never)
    #[arg(long)]
    pub throw_every: Option<usize>,

    /// Limit open idle handles
    #[arg(long)]
    pub max_handles: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Outcome of a stress run
#[derive(Debug, Serialize, PartialEq)]
pub struct StressReport {
    pub objects: usize,
    pub batches: usize,
    pub callbacks_fired: usize,
    pub exceptions_reported: usize,
    pub collections: usize,
    pub loop_turns: u64,
    pub tasks_run: u64,
    pub live_references: usize,
    pub open_handles: usize,
    pub total_pause_us: u64,
}

impl StressCommand {
    pub fn run(&self, config: &Config) -> Result<()> {
        let mut runtime = config.runtime_config();
        if let Some(limit) = self.max_handles {
            runtime = runtime.with_max_handles(limit);
        }

        let plan = StressPlan {
            objects: self.objects.unwrap_or(config.stress.objects),
            batch: self.batch.unwrap_or(config.stress.batch),
            throw_every: self.throw_every.unwrap_or(config.stress.throw_every),
        };

        let report = plan.execute(&Env::with_config(runtime))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!(
                "{} objects in {} batches: {} callbacks fired, {} exceptions reported",
                report.objects, report.batches, report.callbacks_fired, report.exceptions_reported
            );
            println!(
                "{} collections ({} us paused), {} loop turns, {} tasks",
                report.collections, report.total_pause_us, report.loop_turns, report.tasks_run
            );
        }
        Ok(())
    }
}

pub struct StressPlan {
    pub objects: usize,
    pub batch: usize,
    pub throw_every: usize,
}

impl StressPlan {
    pub fn execute(&self, env: &Env) -> Result<StressReport> {
        let hits = Rc::new(RefCell::new(vec![0u32; self.objects]));
        let exceptions = Rc::new(Cell::new(0usize));

        let sink = Rc::clone(&exceptions);
        env.on_uncaught_exception(move |env, exception| {
            tracing::debug!(exception = %env.describe(&exception), "listener threw");
            sink.set(sink.get() + 1);
        });

        let export = env.scoped(|env| -> Result<_> {
            let export = init(env)?;
            Ok(env.create_reference(&export, 1)?)
        })??;

        let batch = if self.batch == 0 {
            self.objects.max(1)
        } else {
            self.batch
        };

        let mut batches = 0;
        let mut start = 0;
        while start < self.objects {
            let end = (start + batch).min(self.objects);
            for index in start..end {
                env.scoped(|env| self.register(env, &export, index, &hits))??;
                if env.should_gc() {
                    let stats = env.collect_garbage()?;
                    tracing::debug!(index, heap_bytes = stats.total_bytes, "threshold collection");
                }
            }

            let stats = env.collect_garbage()?;
            let tasks = env.run_event_loop()?;
            tracing::info!(
                batch = batches,
                registered = end - start,
                tasks,
                live_objects = stats.allocation_count,
                "batch complete"
            );

            batches += 1;
            start = end;
        }
        env.delete_reference(export)?;

        let hits = hits.borrow();
        if let Some(index) = hits.iter().position(|count| *count != 1) {
            anyhow::bail!(
                "listener {index} fired {} times, expected exactly once",
                hits[index]
            );
        }

        let event_loop = env.event_loop()?;
        let loop_stats = event_loop.stats();
        let heap = env.heap_stats();
        Ok(StressReport {
            objects: self.objects,
            batches,
            callbacks_fired: hits.iter().map(|count| *count as usize).sum(),
            exceptions_reported: exceptions.get(),
            collections: heap.collection_count,
            loop_turns: loop_stats.turns,
            tasks_run: loop_stats.tasks_run,
            live_references: env.live_references(),
            open_handles: event_loop.open_handles(),
            total_pause_us: heap.total_pause_time.as_micros() as u64,
        })
    }

    fn register(
        &self,
        env: &Env,
        export: &gcl_runtime::Reference,
        index: usize,
        hits: &Rc<RefCell<Vec<u32>>>,
    ) -> Result<()> {
        let export = env
            .reference_value(export)?
            .ok_or_else(|| anyhow::anyhow!("gc_listen export was collected"))?;

        let throws = self.throw_every != 0 && (index + 1) % self.throw_every == 0;
        let hits = Rc::clone(hits);
        let callback = env.create_function("on_collected", move |env, _| {
            hits.borrow_mut()[index] += 1;
            if throws {
                let message = format!("listener {index} failed");
                return Err(env
                    .create_error(ErrorKind::Error, &message)
                    .unwrap_or_else(|_| Value::string(&message)));
            }
            Ok(Value::Undefined)
        })?;

        let object = env.create_object()?;
        match env.call_function(&Value::Undefined, &export, &[object, callback]) {
            Ok(_) => Ok(()),
            Err(gcl_runtime::CallError::Exception(exception)) => {
                anyhow::bail!("gc_listen threw: {}", env.describe(&exception))
            }
            Err(gcl_runtime::CallError::Host(err)) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_listeners_fire_once() {
        let env = Env::new();
        let plan = StressPlan {
            objects: 50,
            batch: 20,
            throw_every: 10,
        };
        let report = plan.execute(&env).unwrap();

        assert_eq!(report.batches, 3);
        assert_eq!(report.callbacks_fired, 50);
        assert_eq!(report.exceptions_reported, 5);
        assert_eq!(report.collections, 3);
        assert_eq!(report.tasks_run, 50);
        assert_eq!(report.live_references, 0);
        assert_eq!(report.open_handles, 0);
    }

    #[test]
    fn test_single_batch() {
        let env = Env::new();
        let plan = StressPlan {
            objects: 8,
            batch: 0,
            throw_every: 0,
        };
        let report = plan.execute(&env).unwrap();
        assert_eq!(report.batches, 1);
        assert_eq!(report.exceptions_reported, 0);
        assert_eq!(report.loop_turns, 1);
    }

    #[test]
    fn test_threshold_triggers_collections() {
        let runtime = gcl_runtime::RuntimeConfig::new()
            .with_gc(gcl_runtime::GcConfig::with_threshold(1));
        let env = Env::with_config(runtime);
        let plan = StressPlan {
            objects: 10,
            batch: 0,
            throw_every: 0,
        };
        let report = plan.execute(&env).unwrap();

        // One collection per registration plus the end of the batch
        assert_eq!(report.collections, 11);
        assert_eq!(report.callbacks_fired, 10);
        assert_eq!(report.tasks_run, 10);
        assert_eq!(report.live_references, 0);
    }
}
