use std::{collections::HashMap, fmt};

/// Credentials forwarded by the CO. Never printed: `Debug` lists the keys only.
#[derive(Default)]
pub(crate) struct Secrets(HashMap<String, String>);

impl AsRef<HashMap<String, String>> for Secrets {
  #[inline]
  fn as_ref(&self) -> &HashMap<String, String> {
    &self.0
  }
}

impl From<HashMap<String, String>> for Secrets {
  #[inline]
  fn from(v: HashMap<String, String>) -> Self {
    Secrets(v)
  }
}

impl fmt::Debug for Secrets {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut m = f.debug_map();
    for k in self.0.keys() {
      m.key(k).value(&"SECRET");
    }

    m.finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn debug_redacts_values() {
    let mut map = HashMap::new();
    map.insert("user".to_owned(), "admin".to_owned());
    map.insert("password".to_owned(), "hunter2".to_owned());

    let printed = format!("{:?}", Secrets::from(map));
    assert!(printed.contains("\"password\": \"SECRET\""));
    assert!(!printed.contains("hunter2"));
    assert!(!printed.contains("admin"));
  }
}
