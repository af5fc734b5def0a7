use super::TestConvention;

/// pytest collection rules
///
/// Conventions:
/// - test_*.py and *_test.py files
/// - test* functions
/// - Test* classes (`TestUser::test_add` style names)
pub struct PytestConvention;

impl TestConvention for PytestConvention {
    fn is_test_file(&self, suite_path: &str) -> bool {
        suite_path
            .split('/')
            .next_back()
            .is_some_and(|filename| {
                filename.ends_with(".py")
                    && (filename.starts_with("test_") || filename.ends_with("_test.py"))
            })
    }

    fn is_test_name(&self, name: &str) -> bool {
        // Methods of a Test* class: check both parts
        if let Some((class, method)) = name.split_once("::") {
            return class.starts_with("Test") && method.starts_with("test");
        }
        name.starts_with("test")
    }

    fn name(&self) -> &str {
        "pytest"
    }
}
