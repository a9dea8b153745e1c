/// Value type accepted for a writable field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Text { max_len: usize },
    /// RFC 3339 timestamp, stored normalized to UTC
    Timestamp,
    IntegerList,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldRule {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: true }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: false }
    }
}

/// Restricts an entity to rows whose parent the caller may see
#[derive(Debug)]
pub struct ParentLink {
    pub column: &'static str,
    pub parent: &'static EntityDescriptor,
}

/// Everything the generic model needs to know about one entity
#[derive(Debug)]
pub struct EntityDescriptor {
    pub label: &'static str,
    pub table: &'static str,
    pub all_fields: &'static [&'static str],
    /// Column the `name` filter applies to
    pub name_column: &'static str,
    pub parent: Option<ParentLink>,
    pub not_found_reason: &'static str,
    pub create_rules: &'static [FieldRule],
    pub update_rules: &'static [FieldRule],
    /// Filled from the caller's session on create
    pub owner_column: Option<&'static str>,
    /// Checked before insert/update so duplicates surface as field errors
    pub unique_fields: &'static [&'static str],
    pub admin_only_writes: bool,
    /// Write-only field stored as a salted digest in `password_hash`
    pub password_field: Option<&'static str>,
}

impl EntityDescriptor {
    pub fn has_field(&self, field: &str) -> bool {
        self.all_fields.iter().any(|f| *f == field)
    }

    pub fn is_grouped(&self) -> bool {
        self.parent.is_some()
    }
}

const fn text(max_len: usize) -> FieldKind {
    FieldKind::Text { max_len }
}

pub static USER: EntityDescriptor = EntityDescriptor {
    label: "User",
    table: "users",
    all_fields: &["id", "login", "name", "email", "phone", "description", "flags", "created_at", "updated_at"],
    name_column: "name",
    parent: None,
    not_found_reason: "User is not found",
    create_rules: &[
        FieldRule::required("login", text(100)),
        FieldRule::optional("password", text(100)),
        FieldRule::optional("name", text(100)),
        FieldRule::optional("email", text(50)),
        FieldRule::optional("phone", text(20)),
        FieldRule::optional("description", text(1000)),
        FieldRule::optional("flags", FieldKind::Integer),
    ],
    update_rules: &[
        FieldRule::optional("password", text(100)),
        FieldRule::optional("name", text(100)),
        FieldRule::optional("email", text(50)),
        FieldRule::optional("phone", text(20)),
        FieldRule::optional("description", text(1000)),
        FieldRule::optional("flags", FieldKind::Integer),
    ],
    owner_column: None,
    unique_fields: &["login"],
    admin_only_writes: true,
    password_field: Some("password"),
};

pub static SCHEDULE: EntityDescriptor = EntityDescriptor {
    label: "Schedule",
    table: "schedules",
    all_fields: &["id", "name", "owner_id", "created_at", "updated_at"],
    name_column: "name",
    parent: None,
    not_found_reason: "Schedule is not found",
    create_rules: &[FieldRule::required("name", text(100))],
    update_rules: &[FieldRule::optional("name", text(100))],
    owner_column: Some("owner_id"),
    unique_fields: &[],
    admin_only_writes: false,
    password_field: None,
};

pub static SCHEDULE_DETAIL: EntityDescriptor = EntityDescriptor {
    label: "Schedule detail",
    table: "schedule_details",
    all_fields: &["id", "time", "description", "members", "schedule_id", "created_at", "updated_at"],
    // details carry no name of their own
    name_column: "description",
    parent: Some(ParentLink { column: "schedule_id", parent: &SCHEDULE }),
    not_found_reason: "Schedule or schedule-detail is not found",
    create_rules: &[
        FieldRule::required("time", FieldKind::Timestamp),
        FieldRule::optional("description", text(255)),
        FieldRule::optional("members", FieldKind::IntegerList),
        FieldRule::required("schedule_id", FieldKind::Integer),
    ],
    update_rules: &[
        FieldRule::optional("time", FieldKind::Timestamp),
        FieldRule::optional("description", text(255)),
        FieldRule::optional("members", FieldKind::IntegerList),
        FieldRule::optional("schedule_id", FieldKind::Integer),
    ],
    owner_column: None,
    unique_fields: &[],
    admin_only_writes: false,
    password_field: None,
};
