use crate::error::Result;
use image::DynamicImage;
use std::path::Path;

/// Profile of the logged-in account, read fresh on every request.
#[derive(Debug, Clone)]
pub struct User {
    phone_number: String,
    name: String,
    avatar: DynamicImage,
}

impl User {
    pub fn new(phone_number: impl Into<String>, name: impl Into<String>, avatar: DynamicImage) -> Self {
        Self {
            phone_number: phone_number.into(),
            name: name.into(),
            avatar,
        }
    }

    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn avatar(&self) -> &DynamicImage {
        &self.avatar
    }

    pub fn save_avatar(&self, path: &Path) -> Result<()> {
        self.avatar.save(path)?;
        Ok(())
    }
}
