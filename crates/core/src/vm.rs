// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Local VM management through the provisioner.
//!
//! VMs are slow to start and stop, so by default a scenario's VMs are only
//! halted when the orchestrator is closed at the end of the run. Passing
//! `destroy` gives a clean slate and destroys the VM on close instead.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::command::{CommandRunner, CommandSpec};
use crate::scope::ResourceScope;
use crate::HarnessError;

/// The provisioner templates available to a run, keyed by hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmDefinitions {
    prefix: String,
    by_hostname: BTreeMap<String, PathBuf>,
}

impl VmDefinitions {
    /// Lists every subdirectory of `dir` as a definition.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::DefinitionDiscovery` if the directory cannot be read.
    pub fn discover(dir: impl AsRef<Path>, prefix: &str) -> Result<Self, HarnessError> {
        let dir = dir.as_ref();
        let discovery_error = |source| HarnessError::DefinitionDiscovery {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(discovery_error)? {
            let path = entry.map_err(discovery_error)?.path();
            if path.is_dir() {
                paths.push(path);
            }
        }

        let definitions = Self::from_paths(prefix, paths);
        tracing::info!(
            "found {} VM definition(s) in {}",
            definitions.by_hostname.len(),
            dir.display()
        );
        Ok(definitions)
    }

    /// Builds the mapping from explicit template directories.
    #[must_use]
    pub fn from_paths<I>(prefix: &str, paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let by_hostname = paths
            .into_iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                Some((format!("{prefix}{name}"), path))
            })
            .collect();
        Self {
            prefix: prefix.to_string(),
            by_hostname,
        }
    }

    /// The hostname a VM built from `definition` will carry.
    #[must_use]
    pub fn hostname_for(&self, definition: &str) -> String {
        format!("{}{definition}", self.prefix)
    }

    /// Resolves a definition name to its hostname.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::UnknownImage` if no template matches.
    pub fn resolve(&self, definition: &str) -> Result<String, HarnessError> {
        let hostname = self.hostname_for(definition);
        if self.by_hostname.contains_key(&hostname) {
            Ok(hostname)
        } else {
            Err(HarnessError::UnknownImage(definition.to_string()))
        }
    }

    /// Template directory for a hostname.
    #[must_use]
    pub fn directory(&self, hostname: &str) -> Option<&Path> {
        self.by_hostname.get(hostname).map(PathBuf::as_path)
    }

    /// Known hostnames with their template directories, sorted by hostname.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.by_hostname
            .iter()
            .map(|(hostname, path)| (hostname.as_str(), path.as_path()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_hostname.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_hostname.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    Halt,
    Destroy,
}

impl Teardown {
    const fn verb(self) -> &'static str {
        match self {
            Self::Halt => "halt",
            Self::Destroy => "destroy",
        }
    }

    const fn args(self) -> &'static [&'static str] {
        match self {
            Self::Halt => &["halt"],
            Self::Destroy => &["destroy", "--force"],
        }
    }
}

type Bindings = Rc<RefCell<BTreeMap<String, String>>>;

struct Provisioner {
    runner: Rc<dyn CommandRunner>,
    definitions: Rc<VmDefinitions>,
    program: String,
}

impl Provisioner {
    fn run(
        &self,
        hostname: &str,
        args: &[&str],
        ignore_errors: bool,
    ) -> Result<String, HarnessError> {
        let dir = self
            .definitions
            .directory(hostname)
            .ok_or_else(|| HarnessError::UnknownImage(hostname.to_string()))?;
        let command = CommandSpec::new(&self.program)
            .args(args.iter().copied())
            .cwd(dir);
        self.runner.run(&command, ignore_errors)
    }

    /// Halts or destroys a VM. Failures are logged and never returned, so one
    /// stuck VM cannot prevent the remaining teardowns.
    fn release(
        &self,
        bindings: &Bindings,
        name: Option<&str>,
        hostname: &str,
        teardown: Teardown,
    ) {
        if let Some(name) = name {
            let mut bindings = bindings.borrow_mut();
            if bindings.get(name).is_some_and(|bound| bound == hostname) {
                bindings.remove(name);
            }
        }
        match self.run(hostname, teardown.args(), true) {
            Ok(_) => match teardown {
                Teardown::Halt => tracing::info!("Suspended {hostname} VM instance"),
                Teardown::Destroy => tracing::info!("Destroyed {hostname} VM instance"),
            },
            Err(err) => {
                tracing::warn!("failed to {} {hostname} VM instance: {err}", teardown.verb());
            }
        }
    }
}

/// Maps scenario-local VM names onto provisioned machines.
pub struct VmOrchestrator {
    provisioner: Rc<Provisioner>,
    machines: Bindings,
    teardown: RefCell<ResourceScope>,
}

impl VmOrchestrator {
    #[must_use]
    pub fn new(
        runner: Rc<dyn CommandRunner>,
        definitions: Rc<VmDefinitions>,
        provisioner: impl Into<String>,
    ) -> Self {
        Self {
            provisioner: Rc::new(Provisioner {
                runner,
                definitions,
                program: provisioner.into(),
            }),
            machines: Rc::new(RefCell::new(BTreeMap::new())),
            teardown: RefCell::new(ResourceScope::new("vm")),
        }
    }

    /// Ensures a local VM built from `definition` is running under `name`.
    ///
    /// With `destroy` set, any existing VM for the definition is destroyed
    /// first and the new one is destroyed on close. Otherwise it is halted.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::UnknownImage` for an unknown definition, or the
    /// provisioner's error if the VM fails to come up.
    pub fn ensure_local_vm(
        &self,
        name: &str,
        definition: &str,
        destroy: bool,
    ) -> Result<(), HarnessError> {
        let hostname = self.provisioner.definitions.resolve(definition)?;
        if destroy {
            self.machines
                .borrow_mut()
                .retain(|_, bound| *bound != hostname);
            self.provisioner
                .release(&self.machines, None, &hostname, Teardown::Destroy);
        }

        self.provisioner
            .run(&hostname, &["up", "--provision"], false)?;
        tracing::info!("Started {hostname} VM instance");
        self.machines
            .borrow_mut()
            .insert(name.to_string(), hostname.clone());

        let teardown = if destroy {
            Teardown::Destroy
        } else {
            Teardown::Halt
        };
        let provisioner = Rc::clone(&self.provisioner);
        let machines = Rc::clone(&self.machines);
        let name = name.to_string();
        self.teardown.borrow_mut().register(move || {
            provisioner.release(&machines, Some(&name), &hostname, teardown);
            Ok(())
        });
        Ok(())
    }

    /// Returns the hostname bound to `name`.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::UnboundName` if `name` was never bound or its
    /// VM has already been released.
    pub fn get_hostname(&self, name: &str) -> Result<String, HarnessError> {
        self.machines
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| HarnessError::UnboundName(name.to_string()))
    }

    /// Names currently bound to a running VM.
    #[must_use]
    pub fn bound_names(&self) -> Vec<String> {
        self.machines.borrow().keys().cloned().collect()
    }

    /// Halts or destroys every VM started through this orchestrator.
    ///
    /// # Errors
    ///
    /// Teardown failures are logged rather than returned, so this only fails
    /// if a registered action reports an error of its own.
    pub fn close(&self) -> Result<(), HarnessError> {
        let mut pending = self.teardown.replace(ResourceScope::new("vm"));
        pending.close()
    }
}

impl std::fmt::Debug for VmOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VmOrchestrator")
            .field("program", &self.provisioner.program)
            .field("machines", &self.machines.borrow())
            .field("teardown", &self.teardown.borrow())
            .finish_non_exhaustive()
    }
}
