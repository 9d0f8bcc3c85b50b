use crate::api::ActionRequest;
use crate::error::ActionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    AppOpened,
    Track,
    Auth,
    SearchItem,
    UploadImage,
    SaveItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Org,
    ItemId,
    FileData,
}

#[derive(Debug)]
pub struct Requirement {
    pub field: Field,
    pub message: &'static str,
}

const fn require(field: Field, message: &'static str) -> Requirement {
    Requirement { field, message }
}

#[derive(Debug)]
pub struct ActionSpec {
    pub name: &'static str,
    pub action: Action,
    pub requires_token: bool,
    /// Checked in order; the first missing field decides the message.
    pub required: &'static [Requirement],
}

pub const ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "app_opened",
        action: Action::AppOpened,
        requires_token: false,
        required: &[],
    },
    ActionSpec {
        name: "ha-track",
        action: Action::Track,
        requires_token: false,
        required: &[],
    },
    ActionSpec {
        name: "auth",
        action: Action::Auth,
        requires_token: false,
        required: &[require(Field::Org, "ORG required")],
    },
    ActionSpec {
        name: "search_item",
        action: Action::SearchItem,
        requires_token: true,
        required: &[
            require(Field::ItemId, "ItemId required"),
            require(Field::Org, "ORG required for item search"),
        ],
    },
    ActionSpec {
        name: "upload_image",
        action: Action::UploadImage,
        requires_token: true,
        required: &[
            require(Field::Org, "ORG required for image upload"),
            require(Field::ItemId, "ItemId required"),
            require(Field::FileData, "fileData (base64) required"),
        ],
    },
    ActionSpec {
        name: "save_item",
        action: Action::SaveItem,
        requires_token: true,
        required: &[
            require(Field::ItemId, "ItemId required"),
            require(Field::Org, "ORG required for item save"),
        ],
    },
];

pub fn lookup(name: &str) -> Option<&'static ActionSpec> {
    ACTIONS.iter().find(|spec| spec.name == name)
}

impl ActionSpec {
    pub fn validate(&self, req: &ActionRequest) -> Result<(), ActionError> {
        for requirement in self.required {
            let present = match requirement.field {
                Field::Org => req.org().is_some(),
                Field::ItemId => req.item_id().is_some(),
                Field::FileData => req.file_data().is_some(),
            };
            if !present {
                return Err(ActionError::ValidationError(requirement.message));
            }
        }
        Ok(())
    }
}
