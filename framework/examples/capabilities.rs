use fibre_framework::{identifier, Framework, Identifier};
use std::sync::Arc;

// --- Abstraction and Implementations ---
trait MessageSender: Send + Sync {
  fn send(&self, to: &str, message: &str) -> String;
}

struct EmailSender;
impl MessageSender for EmailSender {
  fn send(&self, to: &str, message: &str) -> String {
    format!("Sending email to {}: '{}'", to, message)
  }
}

struct SmsSender;
impl MessageSender for SmsSender {
  fn send(&self, to: &str, message: &str) -> String {
    format!("Sending SMS to {}: '{}'", to, message)
  }
}

identifier!(SENDER: dyn MessageSender = "MessageSender");

// A consumer that wants one specific sender plus every sender available.
struct Notifier {
  preferred: Arc<dyn MessageSender>,
  all: Vec<Arc<dyn MessageSender>>,
}

fn main() -> fibre_framework::Result<()> {
  // --- Registration ---
  // Both implementations live under the same identifier, as distinct variants.
  let framework = Framework::new();
  framework
    .edit()
    .implement(&SENDER.variant("email"), (), |()| Ok(Arc::new(EmailSender) as Arc<dyn MessageSender>))?
    .implement(&SENDER.variant("sms"), (), |()| Ok(Arc::new(SmsSender) as Arc<dyn MessageSender>))?
    .service((SENDER.variant("email"), SENDER.all()), |(preferred, all)| {
      Ok(Notifier { preferred, all })
    })?;

  // --- Resolution ---
  let provider = framework.provider();
  let notifier = provider.get(&Identifier::<Notifier>::of())?;

  let result = notifier.preferred.send("test@example.com", "Hello from Fibre!");
  println!("{}", result);
  assert!(result.contains("email"));

  for sender in &notifier.all {
    println!("{}", sender.send("everyone", "Broadcast"));
  }
  assert_eq!(notifier.all.len(), 2);

  // Variants can also be enumerated with their names.
  for (variant, _) in provider.get_all_by_variant(&SENDER)? {
    println!("registered sender: {}", variant);
  }

  Ok(())
}
