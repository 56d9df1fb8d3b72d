/// Declares an RPC interface from its opnum table.
///
/// ```ignore
/// rpc_interface! {
///     pub interface IVdsServiceSan {
///         uuid: "fc5d23e8-a88b-41a5-8de0-2d2f73c5a630",
///         version: (0, 0),
///         base: IUnknown(3),
///         operations {
///             3 => get_san_policy(GetSanPolicyRequest) -> GetSanPolicyResponse;
///             4 => set_san_policy(SetSanPolicyRequest) -> SetSanPolicyResponse;
///         }
///     }
/// }
/// ```
///
/// For an interface `Name`, this generates:
/// - `Name`, a marker type holding `SYNTAX_ID`;
/// - the `NameServer` trait, with one async method per operation, and a `name_rundown` hook;
/// - `RpcCall` implementations binding each request to its opnum and response;
/// - `dispatch_name`, which decodes the request of an opnum and invokes the server.
///   Opnums below the base interface's count are handed to the base dispatcher;
/// - `NameServerHandle` and `register_name_server`, to serve it;
/// - `NameClient`, a typed client over a [`BoundRpcConnection`](crate::interface::BoundRpcConnection).
#[macro_export]
macro_rules! rpc_interface {
    (
        $(#[$meta:meta])*
        $vis:vis interface $name:ident {
            uuid: $uuid:literal,
            version: ($major:literal, $minor:literal),
            $(base: $base:ident ($base_count:literal),)?
            operations {
                $(
                    $(#[$opmeta:meta])*
                    $opnum:literal => $method:ident ($req:ty) -> $resp:ty;
                )*
            }
        }
    ) => {
        $crate::__private::pastey::paste! {

$(#[$meta])*
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
$vis struct $name;

impl $name {
    pub const SYNTAX_ID: $crate::pdu::DceRpcSyntaxId = $crate::pdu::DceRpcSyntaxId::new(
        $crate::__private::msrpc_dtyp::make_guid!($uuid),
        $major,
        $minor,
    );
    pub const NAME: &'static str = stringify!($name);
}

#[doc = concat!("Server side of [`", stringify!($name), "`].")]
#[$crate::__private::async_trait]
$vis trait [<$name Server>]: $([<$base Server>] +)? Send + Sync {
    $(
        $(#[$opmeta])*
        async fn $method(
            &self,
            ctx: &$crate::interface::CallContext,
            request: $req,
        ) -> ::std::result::Result<$resp, $crate::RpcStatus>;
    )*

    /// Releases what the association held (context handles, sessions).
    async fn [<$name:snake _rundown>](&self, _association_id: u64) {}
}

$(
    impl $crate::interface::RpcCall for $req {
        const OPNUM: u16 = $opnum;

        type ResponseType = $resp;
    }
)*

#[doc = concat!("Decodes and runs one call of [`", stringify!($name), "`].")]
$vis async fn [<dispatch_ $name:snake>]<S>(
    server: &S,
    ctx: &$crate::interface::CallContext,
    opnum: u16,
    reader: &mut $crate::__private::msrpc_ndr::NdrReader<'_>,
) -> ::std::result::Result<
    ::std::boxed::Box<dyn $crate::interface::RpcResponse>,
    $crate::interface::DispatchError,
>
where
    S: [<$name Server>] + ?Sized,
{
    $(
        if opnum < $base_count {
            return [<dispatch_ $base:snake>](server, ctx, opnum, reader).await;
        }
    )?
    match opnum {
        $(
            $opnum => {
                let request = <$req as $crate::__private::msrpc_ndr::NdrDecode>::decode_ndr(reader)?;
                $crate::__private::log::trace!(
                    "{}::{} call {}: {:?}",
                    stringify!($name),
                    stringify!($method),
                    ctx.call_id,
                    request
                );
                let response = server.$method(ctx, request).await?;
                Ok(::std::boxed::Box::new(response))
            }
        )*
        _ => Err($crate::interface::DispatchError::UnknownOpnum(opnum)),
    }
}

#[doc = concat!("Serves a `", stringify!($name), "Server` implementation.")]
$vis struct [<$name ServerHandle>]<S: ?Sized>(pub ::std::sync::Arc<S>);

#[$crate::__private::async_trait]
impl<S> $crate::interface::ServerHandle for [<$name ServerHandle>]<S>
where
    S: [<$name Server>] + ?Sized + 'static,
{
    fn syntax_id(&self) -> $crate::pdu::DceRpcSyntaxId {
        $name::SYNTAX_ID
    }

    fn name(&self) -> &'static str {
        $name::NAME
    }

    async fn dispatch(
        &self,
        ctx: &$crate::interface::CallContext,
        opnum: u16,
        reader: &mut $crate::__private::msrpc_ndr::NdrReader<'_>,
    ) -> ::std::result::Result<
        ::std::boxed::Box<dyn $crate::interface::RpcResponse>,
        $crate::interface::DispatchError,
    > {
        [<dispatch_ $name:snake>](self.0.as_ref(), ctx, opnum, reader).await
    }

    async fn rundown(&self, association_id: u64) {
        self.0.[<$name:snake _rundown>](association_id).await;
        $(
            self.0.[<$base:snake _rundown>](association_id).await;
        )?
    }
}

$vis fn [<register_ $name:snake _server>]<S>(
    registry: &mut $crate::interface::ServerRegistry,
    server: ::std::sync::Arc<S>,
) -> $crate::Result<()>
where
    S: [<$name Server>] + 'static,
{
    registry.register(::std::sync::Arc::new([<$name ServerHandle>](server)))
}

#[doc = concat!("Client of [`", stringify!($name), "`].")]
$vis struct [<$name Client>]<T> {
    bound_pipe: T,
}

impl<T> [<$name Client>]<T>
where
    T: $crate::interface::BoundRpcConnection + Send,
{
    $(
        $(#[$opmeta])*
        pub async fn $method(&mut self, request: $req) -> $crate::Result<$resp> {
            $crate::interface::BoundRpcConnection::send_receive(&mut self.bound_pipe, request).await
        }
    )*

    pub fn into_inner(self) -> T {
        self.bound_pipe
    }
}

impl<T> $crate::interface::RpcInterface<T> for [<$name Client>]<T> {
    const SYNTAX_ID: $crate::pdu::DceRpcSyntaxId = $name::SYNTAX_ID;

    fn new(bound_pipe: T) -> Self {
        Self { bound_pipe }
    }
}

        }
    };
}
