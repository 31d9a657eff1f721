use fibre_framework::{Framework, Identifier, LayerRoot};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// --- Components ---

// Lives in the root scope, shared by every workspace.
struct Storage {
  backend: &'static str,
}

// Root of the "Workspace" scope.
struct Workspace {
  root: LayerRoot<String>,
  storage: Arc<Storage>,
}

// One instance per workspace scope.
struct WorkspaceIndexer {
  label: String,
}

fn main() -> fibre_framework::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fibre_framework=debug")))
    .init();

  let framework = Framework::new();
  framework
    .edit()
    .service((), |()| Ok(Storage { backend: "sqlite" }))?
    .layer((Identifier::<Storage>::of(),), |(storage,)| {
      Ok(Workspace {
        root: LayerRoot::new()?,
        storage,
      })
    })?
    .service((Identifier::<Workspace>::of(),), |(workspace,)| {
      Ok(WorkspaceIndexer {
        label: format!("indexer for {} ({})", workspace.root.id(), workspace.root.props()),
      })
    })?;

  let root = framework.provider();

  let personal = root.create_scope(&Identifier::<Workspace>::of(), "ws-personal", "Personal".to_string())?;
  let team = root.create_scope(&Identifier::<Workspace>::of(), "ws-team", "Team".to_string())?;

  for scope in [&personal, &team] {
    let workspace = scope.root()?;
    let indexer = scope.get(&Identifier::<WorkspaceIndexer>::of())?;
    println!("{} on {} -> {}", workspace.root.id(), workspace.storage.backend, indexer.label);
  }

  // Disposing the root provider tears down both workspace scopes.
  root.dispose();
  assert!(personal.is_disposed() && team.is_disposed());
  println!("all scopes disposed");

  Ok(())
}
