use fibre_framework::{Error, Framework, Identifier, IdentifierValue, RECURSION_LIMIT};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

// --- Test Fixtures ---

struct A {
  _c: Arc<C>,
}

struct B {
  _a: Arc<A>,
}

struct C {
  _b: Arc<B>,
}

fn id<T: 'static>() -> IdentifierValue {
  Identifier::<T>::of().value().clone()
}

// --- Error Tests ---

#[test]
fn test_service_not_found() {
  let framework = Framework::new();
  let provider = framework.provider();
  let something: Identifier<String> = Identifier::new("SomeService");

  match provider.get(&something) {
    Err(Error::ServiceNotFound { identifier }) => assert_eq!(identifier.name(), "SomeService"),
    other => panic!("expected ServiceNotFound, got {:?}", other.map(|_| ())),
  }
  assert!(provider.get_optional(&something).unwrap().is_none());
}

#[test]
fn test_missing_dependency_names_both_ends() {
  struct Present {
    _absent: Arc<Absent>,
  }
  struct Absent;

  let framework = Framework::new();
  framework
    .edit()
    .service((Identifier::<Absent>::of(),), |(absent,)| Ok(Present { _absent: absent }))
    .unwrap();

  let provider = framework.provider();
  let err = provider.get(&Identifier::<Present>::of()).err().unwrap();

  match &err {
    Error::MissingDependency { from, target, stack } => {
      assert_eq!(from, &id::<Present>());
      assert_eq!(target, &id::<Absent>());
      // Requested directly: nothing was under construction yet.
      assert!(stack.is_empty());
    }
    other => panic!("expected MissingDependency, got {other}"),
  }
  assert!(err.to_string().contains("Missing dependency"));
}

#[test]
fn test_missing_dependency_stack_holds_the_dependents_above() {
  struct Outer {
    _middle: Arc<Middle>,
  }
  struct Middle {
    _absent: Arc<Absent>,
  }
  struct Absent;

  let framework = Framework::new();
  framework
    .edit()
    .service((Identifier::<Middle>::of(),), |(middle,)| Ok(Outer { _middle: middle }))
    .unwrap()
    .service((Identifier::<Absent>::of(),), |(absent,)| Ok(Middle { _absent: absent }))
    .unwrap();

  let provider = framework.provider();
  match provider.get(&Identifier::<Outer>::of()) {
    Err(Error::MissingDependency { from, target, stack }) => {
      assert_eq!(from, id::<Middle>());
      assert_eq!(target, id::<Absent>());
      assert_eq!(stack, vec![id::<Outer>()]);
    }
    _ => panic!("expected MissingDependency"),
  }
}

#[test]
fn test_optional_does_not_hide_missing_dependencies() {
  struct Present {
    _absent: Arc<String>,
  }

  let framework = Framework::new();
  framework
    .edit()
    .service((Identifier::<String>::new("absent"),), |(absent,)| Ok(Present { _absent: absent }))
    .unwrap();

  let provider = framework.provider();
  let result = provider.get_optional(&Identifier::<Present>::of());
  assert!(matches!(result, Err(Error::MissingDependency { .. })));
}

#[test]
fn test_optional_dependency_resolves_to_none() {
  struct Settings {
    theme: Option<Arc<String>>,
  }

  let theme: Identifier<String> = Identifier::new("theme");

  let framework = Framework::new();
  framework
    .edit()
    .service((theme.optional(),), |(theme,)| Ok(Settings { theme }))
    .unwrap();

  let provider = framework.provider();
  assert!(provider.get(&Identifier::<Settings>::of()).unwrap().theme.is_none());
}

#[test]
fn test_circular_dependency() {
  let framework = Framework::new();
  framework
    .edit()
    .service((Identifier::<C>::of(),), |(c,)| Ok(A { _c: c }))
    .unwrap()
    .service((Identifier::<A>::of(),), |(a,)| Ok(B { _a: a }))
    .unwrap()
    .service((Identifier::<B>::of(),), |(b,)| Ok(C { _b: b }))
    .unwrap();

  let provider = framework.provider();
  for result in [
    provider.get(&Identifier::<A>::of()).map(|_| ()),
    provider.get(&Identifier::<B>::of()).map(|_| ()),
    provider.get(&Identifier::<C>::of()).map(|_| ()),
  ] {
    assert!(matches!(result, Err(Error::CircularDependency { .. })));
  }

  match provider.get(&Identifier::<A>::of()) {
    Err(Error::CircularDependency { stack }) => {
      assert_eq!(stack, vec![id::<A>(), id::<C>(), id::<B>(), id::<A>()]);
    }
    _ => panic!("expected CircularDependency"),
  }
  assert_eq!(provider.cached_count(), 0);
}

#[test]
fn test_two_node_cycle() {
  struct Ping {
    _pong: Arc<Pong>,
  }
  struct Pong {
    _ping: Arc<Ping>,
  }

  let framework = Framework::new();
  framework
    .edit()
    .service((Identifier::<Pong>::of(),), |(pong,)| Ok(Ping { _pong: pong }))
    .unwrap()
    .service((Identifier::<Ping>::of(),), |(ping,)| Ok(Pong { _ping: ping }))
    .unwrap();

  let provider = framework.provider();
  assert!(matches!(
    provider.get(&Identifier::<Ping>::of()),
    Err(Error::CircularDependency { .. })
  ));
  assert!(matches!(
    provider.get(&Identifier::<Pong>::of()),
    Err(Error::CircularDependency { .. })
  ));
}

#[test]
fn test_recursion_limit() {
  struct Link;

  // Link `i` depends on link `i + 1`; the last link has no dependencies.
  let something: Identifier<Link> = Identifier::new("something");
  let last = RECURSION_LIMIT - 1;
  let framework = Framework::new();

  let mut editor = framework.edit();
  for i in 0..last {
    let next = something.variant((i + 1).to_string());
    editor
      .implement(&something.variant(i.to_string()), (next,), |(_next,)| Ok(Arc::new(Link)))
      .unwrap();
  }
  editor
    .implement(&something.variant(last.to_string()), (), |()| Ok(Arc::new(Link)))
    .unwrap();

  let provider = framework.provider();

  // 99 links deep: the deepest factory runs at depth 99.
  assert!(provider.get(&something.variant("1")).is_ok());

  // 100 links deep: the last link would run at depth 100.
  let fresh = framework.provider();
  match fresh.get(&something.variant("0")) {
    Err(Error::RecursionLimit { identifier }) => assert_eq!(identifier.variant(), last.to_string()),
    other => panic!("expected RecursionLimit, got {:?}", other.map(|_| ())),
  }
}

#[test]
fn test_duplicate_service_definition() {
  struct First;
  struct Second;

  let framework = Framework::new();
  framework.edit().service((), |()| Ok(First)).unwrap();
  assert!(matches!(
    framework.edit().service((), |()| Ok(First)),
    Err(Error::DuplicateServiceDefinition { .. })
  ));

  let something: Identifier<dyn std::any::Any + Send + Sync> = Identifier::new("something");
  framework
    .edit()
    .implement(&something, (), |()| Ok(Arc::new(First) as Arc<dyn std::any::Any + Send + Sync>))
    .unwrap();

  match framework
    .edit()
    .implement(&something, (), |()| Ok(Arc::new(Second) as Arc<dyn std::any::Any + Send + Sync>))
  {
    Err(Error::DuplicateServiceDefinition { identifier }) => {
      assert_eq!(identifier.to_string(), "[something]");
    }
    _ => panic!("expected DuplicateServiceDefinition"),
  }
}

#[test]
fn test_same_identifier_in_different_scopes_is_not_a_duplicate() {
  let framework = Framework::new();
  framework
    .edit()
    .service_value(String::from("root"))
    .unwrap()
    .scope("workspace")
    .service_value(String::from("workspace"))
    .unwrap();

  assert_eq!(framework.component_count(), 2);
}

#[test]
fn test_failed_resolution_is_not_cached() {
  struct Config {
    url: Arc<String>,
  }

  let url: Identifier<String> = Identifier::new("url");
  let attempts = Arc::new(AtomicUsize::new(0));
  let counter = attempts.clone();

  let framework = Framework::new();
  framework
    .edit()
    .service((url.clone(),), move |(url,)| {
      counter.fetch_add(1, Ordering::SeqCst);
      Ok(Config { url })
    })
    .unwrap();

  let provider = framework.provider();
  assert!(provider.get(&Identifier::<Config>::of()).is_err());
  assert_eq!(provider.cached_count(), 0);

  framework.edit().implement_value(&url, Arc::new("postgres://db".to_string())).unwrap();

  let config = provider.get(&Identifier::<Config>::of()).unwrap();
  assert_eq!(*config.url, "postgres://db");
  assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[test]
fn test_type_mismatch_is_reported() {
  let framework = Framework::new();
  let as_string: Identifier<String> = Identifier::new("value");
  let as_number: Identifier<u32> = Identifier::new("value");

  framework.edit().implement_value(&as_string, Arc::new("text".to_string())).unwrap();

  let provider = framework.provider();
  assert!(matches!(
    provider.get(&as_number),
    Err(Error::TypeMismatch { .. })
  ));
}

#[test]
fn test_factory_errors_propagate_unchanged() {
  struct Fragile;

  let framework = Framework::new();
  framework
    .edit()
    .service_factory::<Fragile>(|_| Err(Error::NoEntityContext))
    .unwrap();

  let provider = framework.provider();
  assert!(matches!(
    provider.get(&Identifier::<Fragile>::of()),
    Err(Error::NoEntityContext)
  ));
}
