pub trait StringExt {
    fn snake_case(&self) -> String;
    fn is_blank(&self) -> bool;
}

impl StringExt for String {
    fn snake_case(&self) -> String {
        self.as_str().snake_case()
    }

    fn is_blank(&self) -> bool {
        self.as_str().is_blank()
    }
}

impl StringExt for &str {
    fn snake_case(&self) -> String {
        let mut snake_case = String::new();

        for (i, c) in self.chars().enumerate() {
            if c.is_ascii_uppercase() && i > 0 {
                snake_case.push('_');
                snake_case.push(c.to_ascii_lowercase());
            } else if c == '-' || c == ' ' || c == '.' || c == '/' {
                snake_case.push('_');
            } else {
                snake_case.push(c.to_ascii_lowercase());
            }
        }

        snake_case
    }

    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}
