//! The resource kind registry
//!
//! Every managed APIM resource type is one variant of [`ResourceKind`]. The
//! facts about a kind (nouns, URI segments, on-disk names, relationships,
//! capability facets) live in a static [`KindSpec`] record. Orchestrators
//! dispatch on the facets, never on deep type hierarchies.

use std::fmt;

/// Where a policy kind keeps its XML body on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyPlacement {
    /// `<collection dir>/<name>/policy.xml`
    Fragment,
    /// `<parent dir>/<name>.xml`
    PerParent,
    /// `<service dir>/<name>.xml`
    ServiceRoot,
}

/// DTO schema family used to round-trip a kind's wire JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtoFamily {
    NamedValue,
    Tag,
    VersionSet,
    Backend,
    Logger,
    Diagnostic,
    Gateway,
    Policy,
    Product,
    Group,
    Subscription,
    Api,
    ApiRelease,
    Link,
    Workspace,
}

/// Composite identity: "the secondary under the primary".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Composite {
    pub primary: ResourceKind,
    pub secondary: ResourceKind,
    /// For link kinds, the DTO property carrying the secondary's absolute
    /// resource id. Plain composites carry the secondary in their own name.
    pub link_property: Option<&'static str>,
}

/// Static facts about one resource kind.
#[derive(Debug)]
pub struct KindSpec {
    pub kind: ResourceKind,
    pub singular: &'static str,
    pub plural: &'static str,
    /// URI segment of the collection under its parent scope.
    pub collection_uri_path: &'static str,
    /// On-disk collection directory name, for kinds that occupy a subtree.
    pub collection_dir: Option<&'static str>,
    /// JSON information file name inside the per-instance directory.
    pub file_name: Option<&'static str>,
    pub dto: Option<DtoFamily>,
    /// Declared parent kind, for child kinds.
    pub parent: Option<ResourceKind>,
    pub composite: Option<Composite>,
    pub policy: Option<PolicyPlacement>,
    pub mandatory_refs: &'static [(ResourceKind, &'static str)],
    pub optional_refs: &'static [(ResourceKind, &'static str)],
}

macro_rules! kinds {
    ($($name:ident),* $(,)?) => {
        /// A type of managed entity in the API Management service.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ResourceKind { $($name),* }

        impl ResourceKind {
            /// Every kind, in registry declaration order.
            pub const ALL: &'static [ResourceKind] = &[$(ResourceKind::$name),*];
        }
    };
}

kinds! {
    NamedValue,
    Tag,
    VersionSet,
    Backend,
    Logger,
    Diagnostic,
    Gateway,
    GatewayApi,
    PolicyFragment,
    ServicePolicy,
    Product,
    ProductPolicy,
    ProductGroup,
    ProductTag,
    ProductApi,
    Group,
    Subscription,
    Api,
    ApiPolicy,
    ApiRelease,
    ApiOperation,
    ApiOperationPolicy,
    ApiTag,
    ApiDiagnostic,
    Workspace,
    WorkspaceNamedValue,
    WorkspaceBackend,
    WorkspaceTag,
    WorkspaceVersionSet,
    WorkspacePolicyFragment,
    WorkspacePolicy,
    WorkspaceProduct,
    WorkspaceProductGroup,
    WorkspaceGroup,
    WorkspaceApi,
    WorkspaceApiRelease,
}

use ResourceKind::*;

const NO_REFS: &[(ResourceKind, &str)] = &[];

const fn leaf(
    kind: ResourceKind,
    singular: &'static str,
    plural: &'static str,
    uri: &'static str,
    dir: &'static str,
    file: &'static str,
    dto: DtoFamily,
) -> KindSpec {
    KindSpec {
        kind,
        singular,
        plural,
        collection_uri_path: uri,
        collection_dir: Some(dir),
        file_name: Some(file),
        dto: Some(dto),
        parent: None,
        composite: None,
        policy: None,
        mandatory_refs: NO_REFS,
        optional_refs: NO_REFS,
    }
}

const fn child_of(parent: ResourceKind, spec: KindSpec) -> KindSpec {
    KindSpec {
        parent: Some(parent),
        ..spec
    }
}

const fn per_parent_policy(kind: ResourceKind, parent: ResourceKind) -> KindSpec {
    KindSpec {
        kind,
        singular: "policy",
        plural: "policies",
        collection_uri_path: "policies",
        collection_dir: None,
        file_name: None,
        dto: Some(DtoFamily::Policy),
        parent: Some(parent),
        composite: None,
        policy: Some(PolicyPlacement::PerParent),
        mandatory_refs: NO_REFS,
        optional_refs: NO_REFS,
    }
}

static SPECS: [KindSpec; 36] = [
    leaf(
        NamedValue,
        "namedValue",
        "namedValues",
        "namedValues",
        "named values",
        "namedValueInformation.json",
        DtoFamily::NamedValue,
    ),
    leaf(Tag, "tag", "tags", "tags", "tags", "tagInformation.json", DtoFamily::Tag),
    leaf(
        VersionSet,
        "versionSet",
        "versionSets",
        "apiVersionSets",
        "version sets",
        "versionSetInformation.json",
        DtoFamily::VersionSet,
    ),
    leaf(Backend, "backend", "backends", "backends", "backends", "backendInformation.json", DtoFamily::Backend),
    leaf(Logger, "logger", "loggers", "loggers", "loggers", "loggerInformation.json", DtoFamily::Logger),
    KindSpec {
        mandatory_refs: &[(Logger, "properties.loggerId")],
        ..leaf(
            Diagnostic,
            "diagnostic",
            "diagnostics",
            "diagnostics",
            "diagnostics",
            "diagnosticInformation.json",
            DtoFamily::Diagnostic,
        )
    },
    leaf(Gateway, "gateway", "gateways", "gateways", "gateways", "gatewayInformation.json", DtoFamily::Gateway),
    KindSpec {
        composite: Some(Composite {
            primary: Gateway,
            secondary: Api,
            link_property: Some("apiId"),
        }),
        ..leaf(GatewayApi, "apiLink", "apis", "apiLinks", "apis", "gatewayApiInformation.json", DtoFamily::Link)
    },
    KindSpec {
        policy: Some(PolicyPlacement::Fragment),
        ..leaf(
            PolicyFragment,
            "policyFragment",
            "policyFragments",
            "policyFragments",
            "policy fragments",
            "policyFragmentInformation.json",
            DtoFamily::Policy,
        )
    },
    KindSpec {
        kind: ServicePolicy,
        singular: "policy",
        plural: "policies",
        collection_uri_path: "policies",
        collection_dir: None,
        file_name: None,
        dto: Some(DtoFamily::Policy),
        parent: None,
        composite: None,
        policy: Some(PolicyPlacement::ServiceRoot),
        mandatory_refs: NO_REFS,
        optional_refs: NO_REFS,
    },
    leaf(Product, "product", "products", "products", "products", "productInformation.json", DtoFamily::Product),
    per_parent_policy(ProductPolicy, Product),
    KindSpec {
        composite: Some(Composite {
            primary: Product,
            secondary: Group,
            link_property: Some("groupId"),
        }),
        ..leaf(ProductGroup, "groupLink", "groups", "groupLinks", "groups", "productGroupInformation.json", DtoFamily::Link)
    },
    KindSpec {
        composite: Some(Composite {
            primary: Product,
            secondary: Tag,
            link_property: None,
        }),
        ..leaf(ProductTag, "tag", "tags", "tags", "tags", "productTagInformation.json", DtoFamily::Tag)
    },
    KindSpec {
        composite: Some(Composite {
            primary: Product,
            secondary: Api,
            link_property: Some("apiId"),
        }),
        ..leaf(ProductApi, "apiLink", "apis", "apiLinks", "apis", "productApiInformation.json", DtoFamily::Link)
    },
    leaf(Group, "group", "groups", "groups", "groups", "groupInformation.json", DtoFamily::Group),
    KindSpec {
        optional_refs: &[(Product, "properties.scope")],
        ..leaf(
            Subscription,
            "subscription",
            "subscriptions",
            "subscriptions",
            "subscriptions",
            "subscriptionInformation.json",
            DtoFamily::Subscription,
        )
    },
    KindSpec {
        optional_refs: &[(VersionSet, "properties.apiVersionSetId")],
        ..leaf(Api, "api", "apis", "apis", "apis", "apiInformation.json", DtoFamily::Api)
    },
    per_parent_policy(ApiPolicy, Api),
    child_of(
        Api,
        leaf(ApiRelease, "release", "releases", "releases", "releases", "apiReleaseInformation.json", DtoFamily::ApiRelease),
    ),
    KindSpec {
        kind: ApiOperation,
        singular: "operation",
        plural: "operations",
        collection_uri_path: "operations",
        collection_dir: Some("operations"),
        file_name: None,
        dto: None,
        parent: Some(Api),
        composite: None,
        policy: None,
        mandatory_refs: NO_REFS,
        optional_refs: NO_REFS,
    },
    per_parent_policy(ApiOperationPolicy, ApiOperation),
    KindSpec {
        composite: Some(Composite {
            primary: Api,
            secondary: Tag,
            link_property: None,
        }),
        ..leaf(ApiTag, "tag", "tags", "tags", "tags", "apiTagInformation.json", DtoFamily::Tag)
    },
    KindSpec {
        mandatory_refs: &[(Logger, "properties.loggerId")],
        ..child_of(
            Api,
            leaf(
                ApiDiagnostic,
                "diagnostic",
                "diagnostics",
                "diagnostics",
                "diagnostics",
                "apiDiagnosticInformation.json",
                DtoFamily::Diagnostic,
            ),
        )
    },
    leaf(
        Workspace,
        "workspace",
        "workspaces",
        "workspaces",
        "workspaces",
        "workspaceInformation.json",
        DtoFamily::Workspace,
    ),
    child_of(
        Workspace,
        leaf(
            WorkspaceNamedValue,
            "namedValue",
            "namedValues",
            "namedValues",
            "named values",
            "namedValueInformation.json",
            DtoFamily::NamedValue,
        ),
    ),
    child_of(
        Workspace,
        leaf(WorkspaceBackend, "backend", "backends", "backends", "backends", "backendInformation.json", DtoFamily::Backend),
    ),
    child_of(
        Workspace,
        leaf(WorkspaceTag, "tag", "tags", "tags", "tags", "tagInformation.json", DtoFamily::Tag),
    ),
    child_of(
        Workspace,
        leaf(
            WorkspaceVersionSet,
            "versionSet",
            "versionSets",
            "apiVersionSets",
            "version sets",
            "versionSetInformation.json",
            DtoFamily::VersionSet,
        ),
    ),
    KindSpec {
        policy: Some(PolicyPlacement::Fragment),
        ..child_of(
            Workspace,
            leaf(
                WorkspacePolicyFragment,
                "policyFragment",
                "policyFragments",
                "policyFragments",
                "policy fragments",
                "policyFragmentInformation.json",
                DtoFamily::Policy,
            ),
        )
    },
    per_parent_policy(WorkspacePolicy, Workspace),
    child_of(
        Workspace,
        leaf(WorkspaceProduct, "product", "products", "products", "products", "productInformation.json", DtoFamily::Product),
    ),
    KindSpec {
        composite: Some(Composite {
            primary: WorkspaceProduct,
            secondary: WorkspaceGroup,
            link_property: Some("groupId"),
        }),
        ..leaf(
            WorkspaceProductGroup,
            "groupLink",
            "groups",
            "groupLinks",
            "groups",
            "productGroupInformation.json",
            DtoFamily::Link,
        )
    },
    child_of(
        Workspace,
        leaf(WorkspaceGroup, "group", "groups", "groups", "groups", "groupInformation.json", DtoFamily::Group),
    ),
    KindSpec {
        optional_refs: &[(WorkspaceVersionSet, "properties.apiVersionSetId")],
        ..child_of(
            Workspace,
            leaf(WorkspaceApi, "api", "apis", "apis", "apis", "apiInformation.json", DtoFamily::Api),
        )
    },
    child_of(
        WorkspaceApi,
        leaf(
            WorkspaceApiRelease,
            "release",
            "releases",
            "releases",
            "releases",
            "apiReleaseInformation.json",
            DtoFamily::ApiRelease,
        ),
    ),
];

impl ResourceKind {
    /// Static facts about this kind.
    pub fn spec(self) -> &'static KindSpec {
        &SPECS[self as usize]
    }

    pub fn singular(self) -> &'static str {
        self.spec().singular
    }

    pub fn plural(self) -> &'static str {
        self.spec().plural
    }

    pub fn collection_uri_path(self) -> &'static str {
        self.spec().collection_uri_path
    }

    pub fn collection_dir(self) -> Option<&'static str> {
        self.spec().collection_dir
    }

    pub fn file_name(self) -> Option<&'static str> {
        self.spec().file_name
    }

    pub fn dto_family(self) -> Option<DtoFamily> {
        self.spec().dto
    }

    pub fn has_directory(self) -> bool {
        self.spec().collection_dir.is_some()
    }

    pub fn has_information_file(self) -> bool {
        self.spec().file_name.is_some()
    }

    pub fn has_dto(self) -> bool {
        self.spec().dto.is_some()
    }

    pub fn is_child(self) -> bool {
        self.spec().parent.is_some()
    }

    pub fn parent(self) -> Option<ResourceKind> {
        self.spec().parent
    }

    pub fn composite(self) -> Option<&'static Composite> {
        self.spec().composite.as_ref()
    }

    pub fn is_composite(self) -> bool {
        self.spec().composite.is_some()
    }

    /// Composite kinds whose DTO carries the secondary's absolute id.
    pub fn is_link(self) -> bool {
        matches!(self.spec().composite, Some(c) if c.link_property.is_some())
    }

    pub fn link_property(self) -> Option<&'static str> {
        self.spec().composite.and_then(|c| c.link_property)
    }

    pub fn is_policy(self) -> bool {
        self.spec().policy.is_some()
    }

    pub fn policy_placement(self) -> Option<PolicyPlacement> {
        self.spec().policy
    }

    /// Mandatory followed by optional reference properties.
    pub fn reference_properties(self) -> impl Iterator<Item = (ResourceKind, &'static str)> {
        let spec = self.spec();
        spec.mandatory_refs
            .iter()
            .chain(spec.optional_refs.iter())
            .copied()
    }

    /// Kinds whose names carry a `;rev=<n>` revision suffix.
    pub fn supports_revisions(self) -> bool {
        matches!(self, Api | WorkspaceApi)
    }

    /// The release kind that flips "current" for a revisioned kind.
    pub fn release_kind(self) -> Option<ResourceKind> {
        match self {
            Api => Some(ApiRelease),
            WorkspaceApi => Some(WorkspaceApiRelease),
            _ => None,
        }
    }

    /// Traversal predecessor: parent for child kinds, primary for composites.
    pub fn predecessor(self) -> Option<ResourceKind> {
        self.spec()
            .parent
            .or_else(|| self.spec().composite.map(|c| c.primary))
    }

    /// Whether `name` is reserved by the service and owned by it.
    ///
    /// Reserved resources are never extracted, PUT, or DELETEd.
    pub fn is_reserved_name(self, name: &str) -> bool {
        match self {
            Subscription => name.eq_ignore_ascii_case("master"),
            Group | WorkspaceGroup => {
                name.eq_ignore_ascii_case("administrators")
                    || name.eq_ignore_ascii_case("developers")
                    || name.eq_ignore_ascii_case("guests")
            }
            _ => false,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().singular)
    }
}
