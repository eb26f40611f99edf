pub mod args;
pub mod declare;
pub mod docs;
pub mod openapi;

pub use args::{HandlerArgs, Reply};
pub use declare::{ApiDocs, ControllerDecl, OperationDecl, SchemaDecl};
pub use docs::{
    BodyDoc, EnumValues, OperationDoc, ParamDoc, ParamType, PropertyDoc, PropertyType, ResponseDoc,
};
pub use openapi::OpenApiGenerator;
